//! The closed catalog of intents the assistant knows about.
//!
//! Known intents are a tagged enum so audits and handler registration can
//! match exhaustively. Anything outside the catalog is carried as
//! `Intent::Custom` and matched purely by pattern similarity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Help,
    CreateReminder,
    ScheduleAppointment,
    CancelAppointment,
    ListAppointments,
    AddShoppingItem,
    ViewShoppingList,
    LogExpense,
    CheckBudget,
    MoodCheckIn,
    Custom(String),
}

impl Intent {
    /// Every intent in the closed catalog (excludes `Custom`).
    pub const CATALOG: [Intent; 11] = [
        Intent::Greeting,
        Intent::Help,
        Intent::CreateReminder,
        Intent::ScheduleAppointment,
        Intent::CancelAppointment,
        Intent::ListAppointments,
        Intent::AddShoppingItem,
        Intent::ViewShoppingList,
        Intent::LogExpense,
        Intent::CheckBudget,
        Intent::MoodCheckIn,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::CreateReminder => "create_reminder",
            Intent::ScheduleAppointment => "schedule_appointment",
            Intent::CancelAppointment => "cancel_appointment",
            Intent::ListAppointments => "list_appointments",
            Intent::AddShoppingItem => "add_shopping_item",
            Intent::ViewShoppingList => "view_shopping_list",
            Intent::LogExpense => "log_expense",
            Intent::CheckBudget => "check_budget",
            Intent::MoodCheckIn => "mood_check_in",
            Intent::Custom(name) => name,
        }
    }

    /// Canonical phrasings for a catalog intent.
    ///
    /// Used as the suggested patterns when an audit emits a stub for an
    /// intent that has no handler yet.
    pub fn default_patterns(&self) -> &'static [&'static str] {
        match self {
            Intent::Greeting => &["hello", "hi there", "good morning"],
            Intent::Help => &["help", "what can you do"],
            Intent::CreateReminder => &["remind me", "schedule reminder", "set a reminder"],
            Intent::ScheduleAppointment => &["book appointment", "schedule appointment"],
            Intent::CancelAppointment => &["cancel appointment"],
            Intent::ListAppointments => &["my appointments", "list appointments"],
            Intent::AddShoppingItem => &["add to shopping list", "buy"],
            Intent::ViewShoppingList => &["shopping list", "show shopping list"],
            Intent::LogExpense => &["spent", "log expense"],
            Intent::CheckBudget => &["budget", "how much left"],
            Intent::MoodCheckIn => &["i feel", "my mood"],
            Intent::Custom(_) => &[],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    /// Unknown names become `Intent::Custom`; only blank input is an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        if name.is_empty() {
            return Err("intent name must not be empty".to_string());
        }
        Ok(Intent::CATALOG
            .iter()
            .find(|i| i.as_str() == name)
            .cloned()
            .unwrap_or(Intent::Custom(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_roundtrip() {
        for intent in Intent::CATALOG.iter() {
            let parsed: Intent = intent.as_str().parse().unwrap();
            assert_eq!(&parsed, intent);
        }
    }

    #[test]
    fn unknown_name_is_custom() {
        let parsed: Intent = "Water_Plants".parse().unwrap();
        assert_eq!(parsed, Intent::Custom("water_plants".to_string()));
        assert!("   ".parse::<Intent>().is_err());
    }

    #[test]
    fn every_catalog_intent_has_patterns() {
        for intent in Intent::CATALOG.iter() {
            assert!(
                !intent.default_patterns().is_empty(),
                "{intent} has no default patterns"
            );
        }
    }
}
