//! The user profile and slot resolution.
//!
//! The mapping service names a slot (and, for repeated sections, a group
//! address); the profile turns that into the value to write.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Slot names the mapping service may assign, besides
/// [`formpilot_page::CUSTOM_QUESTION`].
pub const PROFILE_SLOTS: &[&str] = &[
    "first_name",
    "last_name",
    "full_name",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "postal_code",
    "country",
    "location",
    "linkedin",
    "github",
    "website",
    "headline",
    "summary",
    "current_title",
    "current_company",
    "years_experience",
    "work_authorization",
    "requires_sponsorship",
    "willing_to_relocate",
    "salary_expectation",
    "notice_period",
    "start_date",
    "end_date",
    "skills",
    "job_title",
    "company",
    "job_location",
    "description",
    "currently_working",
    "school",
    "degree",
    "field_of_study",
    "graduation_date",
    "gpa",
];

/// Repeater group names.
pub const GROUP_EXPERIENCE: &str = "experience";
pub const GROUP_EDUCATION: &str = "education";

/// Everything the filler may draw on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<String>,

    // Work preferences, kept as the answer text a form expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_authorization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_sponsorship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub willing_to_relocate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_expectation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice_period: Option<String>,
    /// Earliest start date for a new role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_from: Option<String>,

    /// Most recent first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub experience: Vec<Experience>,
    /// Most recent first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub education: Vec<Education>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,

    /// Free-form answers keyed by slot name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// One position held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub current: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One degree or course of study.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub school: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpa: Option<String>,
}

impl Profile {
    /// Load a profile from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a profile from YAML.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Write the profile as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_yaml()?)?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// Value for `slot`, optionally inside a repeater group. Group indices
    /// are zero-based; without one, the most recent entry is used.
    pub fn resolve(&self, slot: &str, group: Option<&str>, index: Option<usize>) -> Option<String> {
        let slot = slot.trim().to_ascii_lowercase();
        let group = group.map(|g| g.trim().to_ascii_lowercase());
        let index = index.unwrap_or(0);

        let value = match (group.as_deref(), slot.as_str()) {
            (Some(GROUP_EDUCATION), _) => self.education_slot(index, &slot),
            (Some(GROUP_EXPERIENCE), _) => self.experience_slot(index, &slot),
            (_, "school" | "degree" | "field_of_study" | "graduation_date" | "gpa") => {
                self.education_slot(index, &slot)
            }
            (_, "job_title" | "company" | "job_location" | "description" | "currently_working") => {
                self.experience_slot(index, &slot)
            }
            _ => self.scalar_slot(&slot),
        };

        value
            .or_else(|| self.extra.get(&slot).cloned())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn scalar_slot(&self, slot: &str) -> Option<String> {
        let latest = self.experience.first();
        match slot {
            "first_name" => self.first_name.clone(),
            "last_name" => self.last_name.clone(),
            "full_name" | "name" => self.full_name(),
            "email" => self.email.clone(),
            "phone" => self.phone.clone(),
            "address" => self.address.clone(),
            "city" => self.city.clone(),
            "state" => self.state.clone(),
            "postal_code" | "zip" => self.postal_code.clone(),
            "country" => self.country.clone(),
            "location" => {
                let parts: Vec<&str> = [&self.city, &self.state, &self.country]
                    .into_iter()
                    .filter_map(|p| p.as_deref())
                    .collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            "linkedin" => self.linkedin.clone(),
            "github" => self.github.clone(),
            "website" | "portfolio" => self.website.clone(),
            "headline" => self.headline.clone(),
            "summary" => self.summary.clone(),
            "years_experience" => self.years_experience.clone(),
            "work_authorization" => self.work_authorization.clone(),
            "requires_sponsorship" => self.requires_sponsorship.clone(),
            "willing_to_relocate" => self.willing_to_relocate.clone(),
            "salary_expectation" => self.salary_expectation.clone(),
            "notice_period" => self.notice_period.clone(),
            "start_date" | "available_from" => self.available_from.clone(),
            "current_title" => latest.map(|e| e.title.clone()),
            "current_company" => latest.map(|e| e.company.clone()),
            "skills" => (!self.skills.is_empty()).then(|| self.skills.join(", ")),
            _ => None,
        }
    }

    fn experience_slot(&self, index: usize, slot: &str) -> Option<String> {
        let entry = self.experience.get(index)?;
        match slot {
            "job_title" | "title" => Some(entry.title.clone()),
            "company" => Some(entry.company.clone()),
            "job_location" | "location" => entry.location.clone(),
            "start_date" => entry.start_date.clone(),
            "end_date" => entry.end_date.clone(),
            "description" => entry.description.clone(),
            "currently_working" | "current" => Some(entry.current.to_string()),
            _ => None,
        }
    }

    fn education_slot(&self, index: usize, slot: &str) -> Option<String> {
        let entry = self.education.get(index)?;
        match slot {
            "school" => Some(entry.school.clone()),
            "degree" => entry.degree.clone(),
            "field_of_study" => entry.field_of_study.clone(),
            "start_date" => entry.start_date.clone(),
            "end_date" | "graduation_date" => entry.end_date.clone(),
            "gpa" => entry.gpa.clone(),
            _ => None,
        }
    }
}
