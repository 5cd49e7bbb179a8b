pub mod table;

pub use table::{Table, TableError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transaction type of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sell,
    Rent,
}

impl Action {
    /// Value of the action `<select>` in the site's search form
    pub fn form_value(&self) -> &'static str {
        match self {
            Action::Sell => "sell",
            Action::Rent => "rent",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "sell" => Ok(Action::Sell),
            "2" | "rent" => Ok(Action::Rent),
            other => Err(format!("invalid action: {other}")),
        }
    }
}

/// Property category of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Apartment,
    Commerce,
}

impl Category {
    /// Value of the category `<select>` in the site's search form
    pub fn form_value(&self) -> &'static str {
        match self {
            Category::Apartment => "1",
            Category::Commerce => "59",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1"/"2" are menu choices, "59" is the site's own commerce code
        match s.trim().to_lowercase().as_str() {
            "1" | "apartment" | "apartments" => Ok(Category::Apartment),
            "2" | "59" | "commerce" => Ok(Category::Commerce),
            other => Err(format!("invalid category: {other}")),
        }
    }
}

/// One of the four listing shapes, each with its own column schema and rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ListingVariant {
    ApartmentSell,
    ApartmentRent,
    CommerceSell,
    CommerceRent,
}

impl ListingVariant {
    pub fn new(action: Action, category: Category) -> Self {
        match (action, category) {
            (Action::Sell, Category::Apartment) => ListingVariant::ApartmentSell,
            (Action::Rent, Category::Apartment) => ListingVariant::ApartmentRent,
            (Action::Sell, Category::Commerce) => ListingVariant::CommerceSell,
            (Action::Rent, Category::Commerce) => ListingVariant::CommerceRent,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            ListingVariant::ApartmentSell | ListingVariant::CommerceSell => Action::Sell,
            ListingVariant::ApartmentRent | ListingVariant::CommerceRent => Action::Rent,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            ListingVariant::ApartmentSell | ListingVariant::ApartmentRent => Category::Apartment,
            ListingVariant::CommerceSell | ListingVariant::CommerceRent => Category::Commerce,
        }
    }

    /// Output file for this variant, e.g. `sell_apartments.csv`
    pub fn output_file_name(&self) -> String {
        let category = match self.category() {
            Category::Apartment => "apartments",
            Category::Commerce => "commerce",
        };
        format!("{}_{}.csv", self.action().form_value(), category)
    }
}

impl fmt::Display for ListingVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListingVariant::ApartmentSell => "apartment/sell",
            ListingVariant::ApartmentRent => "apartment/rent",
            ListingVariant::CommerceSell => "commerce/sell",
            ListingVariant::CommerceRent => "commerce/rent",
        };
        f.write_str(name)
    }
}

/// A single extracted cell.
///
/// `Missing` is the explicit "no data" marker and is never confused with an
/// empty string: blank page text is normalized to `Missing` on the way in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Missing,
}

impl FieldValue {
    /// Wraps text, treating blank input as missing
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            FieldValue::Missing
        } else {
            FieldValue::Text(value)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map(FieldValue::Number).unwrap_or(FieldValue::Missing)
    }
}

impl fmt::Display for FieldValue {
    /// Cell text as written to the output file; missing cells are empty
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Missing => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operator_choices() {
        assert_eq!("1".parse::<Action>().unwrap(), Action::Sell);
        assert_eq!(" RENT ".parse::<Action>().unwrap(), Action::Rent);
        assert!("buy".parse::<Action>().is_err());

        assert_eq!("1".parse::<Category>().unwrap(), Category::Apartment);
        assert_eq!("2".parse::<Category>().unwrap(), Category::Commerce);
        assert_eq!("59".parse::<Category>().unwrap(), Category::Commerce);
        assert!("3".parse::<Category>().is_err());
    }

    #[test]
    fn test_variant_output_files() {
        let variant = ListingVariant::new(Action::Sell, Category::Apartment);
        assert_eq!(variant, ListingVariant::ApartmentSell);
        assert_eq!(variant.output_file_name(), "sell_apartments.csv");
        assert_eq!(
            ListingVariant::CommerceRent.output_file_name(),
            "rent_commerce.csv"
        );
    }

    #[test]
    fn test_field_value_rendering() {
        assert_eq!(FieldValue::text("   "), FieldValue::Missing);
        assert_eq!(FieldValue::Number(20000.0).to_string(), "20000");
        assert_eq!(FieldValue::Number(60.5).to_string(), "60.5");
        assert_eq!(FieldValue::Missing.to_string(), "");
        assert_eq!(FieldValue::from(None::<f64>), FieldValue::Missing);
        assert!(FieldValue::text("").is_missing());
        assert!(!FieldValue::Number(0.0).is_missing());
    }
}
