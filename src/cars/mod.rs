mod extract;

pub use extract::{locate_table, parse_rows, RowOutcome, SkipReason, TableNotFound};

use std::fmt;

/// One vehicle row from the wiki table. Immutable once assembled; a batch may
/// contain duplicate names, the snapshot write preserves them as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Car {
    pub name: String,
    pub year: Option<i32>,
    pub image_url: Option<String>,
    pub price: i32,
    pub rarity: String,
    pub speed: f64,
    pub handling: f64,
    pub acceleration: f64,
    pub launch: f64,
    pub braking: f64,
    pub class_letter: Option<String>,
    pub class_number: Option<i32>,
    pub source: String,
}

impl fmt::Display for Car {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({})", self.name, year),
            None => write!(f, "{}", self.name),
        }
    }
}
