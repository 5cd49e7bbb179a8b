//! Field derivations shared by every listing variant.
//!
//! Each function takes the raw value produced by locator resolution and turns
//! it into the cell(s) written to the table. None of them fail: anything that
//! cannot be derived becomes `FieldValue::Missing`.

use crate::models::FieldValue;
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").ok());

/// Separator in composite floor text, "5 из 9"
const FLOOR_SEPARATOR: &str = "из";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorCategory {
    First,
    Second,
    Middle,
    SecondToLast,
    Last,
}

impl FloorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            FloorCategory::First => "Первый этаж",
            FloorCategory::Second => "Второй этаж",
            FloorCategory::Middle => "Средние этажи",
            FloorCategory::SecondToLast => "Предпоследний этаж",
            FloorCategory::Last => "Последний этаж",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearBand {
    Before1980,
    From1980To1990,
    From1990To2000,
    From2000To2010,
    From2010To2020,
    After2020,
}

impl YearBand {
    pub fn label(&self) -> &'static str {
        match self {
            YearBand::Before1980 => "<1980",
            YearBand::From1980To1990 => "1980-1990",
            YearBand::From1990To2000 => "1990-2000",
            YearBand::From2000To2010 => "2000-2010",
            YearBand::From2010To2020 => "2010-2020",
            YearBand::After2020 => ">2020",
        }
    }
}

/// Which comma-separated segment of a location string names the district
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPick {
    Second,
    Last,
}

/// Room count is the leading digit of the listing title, "2-комнатная ..."
pub fn room_count(title: &FieldValue) -> FieldValue {
    title
        .as_text()
        .and_then(|t| t.chars().next())
        .and_then(|c| c.to_digit(10))
        .map(|d| FieldValue::Number(d as f64))
        .unwrap_or(FieldValue::Missing)
}

/// First integer or decimal number in the square-meters text
pub fn area(text: &FieldValue) -> FieldValue {
    let number = NUMBER.as_ref();
    text.as_text()
        .and_then(|t| number?.find(t))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .into()
}

/// Page text can hold any integer; out-of-range differences have no category.
pub fn floor_category(floor: i64, total: i64) -> Option<FloorCategory> {
    let below_top = total.checked_sub(1)?;
    let gap = total.checked_sub(floor)?;
    if floor == 1 {
        Some(FloorCategory::First)
    } else if floor == 2 {
        Some(FloorCategory::Second)
    } else if floor > 2 && floor < below_top {
        Some(FloorCategory::Middle)
    } else if gap == 1 {
        Some(FloorCategory::SecondToLast)
    } else if floor == total {
        Some(FloorCategory::Last)
    } else {
        None
    }
}

/// Split "<floor> из <total>" into (floor, total, category).
///
/// With `bare_digit`, a lone number counts as both floor and total.
pub fn floor(text: &FieldValue, bare_digit: bool) -> [FieldValue; 3] {
    let missing = [FieldValue::Missing, FieldValue::Missing, FieldValue::Missing];
    let Some(text) = text.as_text() else {
        return missing;
    };

    let parsed = if text.contains(FLOOR_SEPARATOR) {
        let parts: Vec<&str> = text.split(FLOOR_SEPARATOR).map(str::trim).collect();
        match parts.as_slice() {
            [floor, total] => floor.parse::<i64>().ok().zip(total.parse::<i64>().ok()),
            _ => None,
        }
    } else if bare_digit && is_digits(text.trim()) {
        text.trim().parse::<i64>().ok().map(|f| (f, f))
    } else {
        return missing;
    };

    match parsed {
        Some((floor, total)) => [
            FieldValue::Number(floor as f64),
            FieldValue::Number(total as f64),
            floor_category(floor, total)
                .map(|c| FieldValue::Text(c.label().to_string()))
                .unwrap_or(FieldValue::Missing),
        ],
        None => {
            error!("Could not parse floor text '{}'", text);
            missing
        }
    }
}

/// 1980 and 1990 both fall in "1980-1990"; later bands include only
/// their upper bound.
pub fn year_band(year: i64) -> YearBand {
    match year {
        y if y < 1980 => YearBand::Before1980,
        1980..=1990 => YearBand::From1980To1990,
        1991..=2000 => YearBand::From1990To2000,
        2001..=2010 => YearBand::From2000To2010,
        2011..=2020 => YearBand::From2010To2020,
        _ => YearBand::After2020,
    }
}

pub fn year_category(year: &FieldValue) -> FieldValue {
    year.as_text()
        .and_then(|t| t.trim().parse::<i64>().ok())
        .map(|y| FieldValue::Text(year_band(y).label().to_string()))
        .unwrap_or(FieldValue::Missing)
}

pub fn district(location: &FieldValue, pick: SegmentPick) -> FieldValue {
    let Some(text) = location.as_text() else {
        return FieldValue::Missing;
    };
    let segments: Vec<&str> = text.split(',').collect();
    if segments.len() < 2 {
        return FieldValue::Missing;
    }
    let segment = match pick {
        SegmentPick::Second => segments[1],
        SegmentPick::Last => segments[segments.len() - 1],
    };
    FieldValue::text(segment.trim())
}

/// Last comma-separated segment of an address line. Without a comma the
/// value is missing, unless `keep_plain` keeps the whole line.
pub fn address(text: &FieldValue, keep_plain: bool) -> FieldValue {
    match text.as_text() {
        Some(t) if t.contains(',') => t
            .rsplit(',')
            .next()
            .map(|s| FieldValue::text(s.trim()))
            .unwrap_or(FieldValue::Missing),
        Some(t) if keep_plain => FieldValue::text(t),
        _ => FieldValue::Missing,
    }
}

/// Digits of a raw price, "1 200 000 〒" -> "1200000"
pub fn clean_price(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn price_per_area(price: f64, area: f64) -> Option<f64> {
    if area == 0.0 || !area.is_finite() {
        return None;
    }
    let value = price / area;
    value.is_finite().then(|| (value * 100.0).round() / 100.0)
}

/// Returns (price, price per square meter)
pub fn price(raw: &FieldValue, area: Option<f64>) -> (FieldValue, FieldValue) {
    let Some(raw) = raw.as_text() else {
        return (FieldValue::Missing, FieldValue::Missing);
    };

    let cleaned = clean_price(raw);
    let Ok(price) = cleaned.parse::<f64>() else {
        error!("couldn't convert the price '{}' to a number", raw);
        return (FieldValue::Missing, FieldValue::Missing);
    };

    let per_area = area.and_then(|a| price_per_area(price, a));
    (FieldValue::Number(price), per_area.into())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
