//! Selector catalog and the per-variant extraction tables.
//!
//! The four listing variants share one engine (`extractor`); what differs
//! between them lives here as data: column schema, rule order, which
//! candidate lists feed each rule, and the few per-variant quirks.

use crate::models::ListingVariant;
use crate::scrapers::fields::SegmentPick;
use crate::scrapers::locator::Locator;
use serde::{Deserialize, Serialize};

pub mod columns {
    pub const LINK: &str = "Ссылка";
    pub const ROOMS: &str = "Комнатность";
    pub const AREA: &str = "Площадь";
    pub const FLOOR: &str = "Этаж";
    pub const TOTAL_FLOORS: &str = "Этажность дома";
    pub const FLOOR_CATEGORY: &str = "Этажность категория";
    pub const FLOORS: &str = "Этажность";
    pub const PRICE_PER_AREA: &str = "Ценна за квм";
    pub const PRICE: &str = "Стоимость";
    pub const RENT_PRICE: &str = "Ценна";
    pub const DISTRICT: &str = "Район";
    pub const ADDRESS: &str = "Адрес";
    pub const COMPLEX: &str = "ЖК";
    pub const BUILDING_TYPE: &str = "Тип построения";
    pub const YEAR: &str = "Год постройки";
    pub const YEAR_CATEGORY: &str = "Год постройки - категория";
    pub const CONDITION: &str = "состояние";
    pub const CEILING: &str = "потолки";
    pub const BATHROOM: &str = "санузел";
    pub const SELLER: &str = "продавец";
    pub const PLACEMENT: &str = "Размещение объекта";
    pub const OBJECT_NAME: &str = "Название объекта";
    pub const OPERATING_BUSINESS: &str = "Действующий бизнес";
    pub const COMMUNICATIONS: &str = "коммуникации";
    pub const LOCATION_LINE: &str = "Линия домов";
    pub const SECURITY: &str = "Безопасность";
    pub const FREE_LAYOUT: &str = "Свободная планировка";
    pub const ENTRANCE: &str = "Вход";
    pub const PARKING: &str = "Парковка";
    pub const ALLOCATED_POWER: &str = "Выделенная мощность";
}

use columns::*;

/// Logical page fields, each backed by a candidate list in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    OfferTitle,
    LiveSquare,
    CommerceSquare,
    FlatFloor,
    HouseFloorCount,
    Location,
    Street,
    ResidentialComplex,
    BuildingType,
    HouseYear,
    Renovation,
    RentRenovation,
    CeilingDetails,
    CeilingShort,
    Toilet,
    Seller,
    Price,
    CommercePrice,
    CommercePlacement,
    ComplexName,
    CommerceRenovation,
    OperatingBusiness,
    Communications,
    LocationLine,
    Security,
    CustomLayout,
    Entrance,
    Parking,
    AllocatedPower,
}

fn css(selectors: &[&str]) -> Vec<Locator> {
    selectors.iter().map(|s| Locator::css(*s)).collect()
}

fn short_info(data_name: &str) -> String {
    format!("div[data-name='{data_name}'] > div.offer__advert-short-info")
}

fn details(data_name: &str) -> String {
    format!("dt[data-name='{data_name}'] ~ dd")
}

/// Candidate lists for every field, in fallback order (current markup first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorCatalog {
    pub offer_title: Vec<Locator>,
    pub live_square: Vec<Locator>,
    pub commerce_square: Vec<Locator>,
    pub flat_floor: Vec<Locator>,
    pub house_floor_count: Vec<Locator>,
    pub location: Vec<Locator>,
    pub street: Vec<Locator>,
    pub residential_complex: Vec<Locator>,
    pub building_type: Vec<Locator>,
    pub house_year: Vec<Locator>,
    pub renovation: Vec<Locator>,
    pub rent_renovation: Vec<Locator>,
    pub ceiling_details: Vec<Locator>,
    pub ceiling_short: Vec<Locator>,
    pub toilet: Vec<Locator>,
    pub seller: Vec<Locator>,
    pub price: Vec<Locator>,
    pub commerce_price: Vec<Locator>,
    pub commerce_placement: Vec<Locator>,
    pub complex_name: Vec<Locator>,
    pub commerce_renovation: Vec<Locator>,
    pub operating_business: Vec<Locator>,
    pub communications: Vec<Locator>,
    pub location_line: Vec<Locator>,
    pub security: Vec<Locator>,
    pub custom_layout: Vec<Locator>,
    pub entrance: Vec<Locator>,
    pub parking: Vec<Locator>,
    pub allocated_power: Vec<Locator>,

    /// Anchors inside listing cards on a search results page
    pub listing_links: Locator,
    pub category_select: Locator,
    pub action_select: Locator,
    pub search_button: Locator,
}

impl Default for SelectorCatalog {
    fn default() -> Self {
        Self {
            offer_title: css(&["div.offer__advert-title > h1"]),
            live_square: css(&["div[data-name='live.square']"]),
            commerce_square: css(&["div[data-name='com.square']"]),
            flat_floor: vec![Locator::css(short_info("flat.floor"))],
            house_floor_count: vec![Locator::css(short_info("house.floor_num"))],
            location: css(&["div.offer__location.offer__advert-short-info > span"]),
            street: vec![Locator::css(short_info("map.street"))],
            residential_complex: vec![Locator::css(short_info("map.complex"))],
            building_type: vec![Locator::css(short_info("flat.building"))],
            house_year: vec![Locator::css(short_info("house.year"))],
            renovation: vec![Locator::css(short_info("flat.renovation"))],
            rent_renovation: vec![Locator::css(short_info("flat.rent_renovation"))],
            ceiling_details: vec![Locator::css(details("ceiling"))],
            ceiling_short: vec![Locator::css(short_info("ceiling"))],
            toilet: vec![
                Locator::css(details("separated_toilet")),
                Locator::css(details("flat.toilet")),
                Locator::css(short_info("separated_toilet")),
                Locator::css(short_info("flat.toilet")),
            ],
            seller: css(&[
                "div.label.label--default.label-user-agent",
                "div.label.label--transparent.label-user-identified-specialist",
                "div.owners__name.owners__name--large",
                "div.owners__labels-list",
            ]),
            price: css(&[
                "div.offer__price",
                "p.offer__price.offer__price--full",
                "p.offer__price",
            ]),
            commerce_price: css(&[
                "div.offer__price > span.offer__price-part",
                "p.offer__price.offer__price--full",
            ]),
            commerce_placement: vec![Locator::css(short_info("com.location"))],
            complex_name: vec![Locator::css(short_info("office.complex_name"))],
            commerce_renovation: vec![
                Locator::css(details("com.renovation")),
                Locator::css(short_info("com.renovation")),
            ],
            operating_business: vec![
                Locator::css(details("estate.is_buss")),
                Locator::css(short_info("religious.is_buss")),
            ],
            communications: vec![
                Locator::css(details("com.communications")),
                Locator::css(short_info("com.communications")),
            ],
            location_line: vec![
                Locator::css(details("com.location_line")),
                Locator::css(short_info("com.location_line")),
            ],
            security: vec![
                Locator::css(details("com.security")),
                Locator::css(short_info("com.security")),
            ],
            custom_layout: vec![Locator::css(details("com.custom_layout"))],
            entrance: vec![Locator::css(details("com.entrance_opts"))],
            parking: vec![
                Locator::css(details("com.parking_opts")),
                Locator::css("div[data-name='com.parking_opts'] div.offer__advert-short-info"),
            ],
            allocated_power: vec![
                Locator::css(details("indust.max_electr")),
                Locator::css(short_info("indust.max_electr")),
            ],

            listing_links: Locator::css("div.a-card__header-left a"),
            category_select: Locator::css(
                "div.search-element-wrap.categories-for-sell > div.element-select > select",
            ),
            action_select: Locator::css("select.category-type"),
            search_button: Locator::xpath("//button[contains(text(), 'Найти')]"),
        }
    }
}

impl SelectorCatalog {
    pub fn get(&self, field: Field) -> &[Locator] {
        match field {
            Field::OfferTitle => &self.offer_title,
            Field::LiveSquare => &self.live_square,
            Field::CommerceSquare => &self.commerce_square,
            Field::FlatFloor => &self.flat_floor,
            Field::HouseFloorCount => &self.house_floor_count,
            Field::Location => &self.location,
            Field::Street => &self.street,
            Field::ResidentialComplex => &self.residential_complex,
            Field::BuildingType => &self.building_type,
            Field::HouseYear => &self.house_year,
            Field::Renovation => &self.renovation,
            Field::RentRenovation => &self.rent_renovation,
            Field::CeilingDetails => &self.ceiling_details,
            Field::CeilingShort => &self.ceiling_short,
            Field::Toilet => &self.toilet,
            Field::Seller => &self.seller,
            Field::Price => &self.price,
            Field::CommercePrice => &self.commerce_price,
            Field::CommercePlacement => &self.commerce_placement,
            Field::ComplexName => &self.complex_name,
            Field::CommerceRenovation => &self.commerce_renovation,
            Field::OperatingBusiness => &self.operating_business,
            Field::Communications => &self.communications,
            Field::LocationLine => &self.location_line,
            Field::Security => &self.security,
            Field::CustomLayout => &self.custom_layout,
            Field::Entrance => &self.entrance,
            Field::Parking => &self.parking,
            Field::AllocatedPower => &self.allocated_power,
        }
    }

    /// Concatenated candidate list for several fields, in the given order
    pub fn candidates(&self, fields: &[Field]) -> Vec<Locator> {
        fields
            .iter()
            .flat_map(|f| self.get(*f).iter().cloned())
            .collect()
    }
}

/// How a rule turns page content into cells
#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// The listing URL itself
    Link,
    /// Resolved text, unchanged
    Text(&'static [Field]),
    Rooms(&'static [Field]),
    /// Also remembered for the price rule
    Area(&'static [Field]),
    Floor {
        fields: &'static [Field],
        bare_digit: bool,
    },
    ConstructionYear(&'static [Field]),
    District {
        fields: &'static [Field],
        pick: SegmentPick,
    },
    Address {
        fields: &'static [Field],
        keep_plain: bool,
    },
    Price(&'static [Field]),
}

impl RuleKind {
    /// Number of cells the rule produces per listing
    #[cfg(test)]
    pub fn arity(&self) -> usize {
        match self {
            RuleKind::Floor { .. } => 3,
            RuleKind::ConstructionYear(_) | RuleKind::Price(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub kind: RuleKind,
    /// Target columns, one per produced cell
    pub columns: &'static [&'static str],
}

#[derive(Debug)]
pub struct RuleSet {
    pub variant: ListingVariant,
    /// Output column order
    pub columns: &'static [&'static str],
    /// Execution order
    pub rules: &'static [Rule],
}

const fn rule(name: &'static str, kind: RuleKind, columns: &'static [&'static str]) -> Rule {
    Rule {
        name,
        kind,
        columns,
    }
}

const LINK_RULE: Rule = rule("link", RuleKind::Link, &[LINK]);
const ROOMS_RULE: Rule = rule("rooms", RuleKind::Rooms(&[Field::OfferTitle]), &[ROOMS]);
const APARTMENT_DISTRICT: Rule = rule(
    "district",
    RuleKind::District {
        fields: &[Field::Location],
        pick: SegmentPick::Second,
    },
    &[DISTRICT],
);
const TITLE_ADDRESS: Rule = rule(
    "address",
    RuleKind::Address {
        fields: &[Field::OfferTitle],
        keep_plain: false,
    },
    &[ADDRESS],
);
const YEAR_RULE: Rule = rule(
    "construction_year",
    RuleKind::ConstructionYear(&[Field::HouseYear]),
    &[YEAR, YEAR_CATEGORY],
);
const TOILET_RULE: Rule = rule("bathroom", RuleKind::Text(&[Field::Toilet]), &[BATHROOM]);
const SELLER_RULE: Rule = rule("seller", RuleKind::Text(&[Field::Seller]), &[SELLER]);
const COMPLEX_RULE: Rule = rule(
    "residential_complex",
    RuleKind::Text(&[Field::ResidentialComplex]),
    &[COMPLEX],
);
const BUILDING_RULE: Rule = rule(
    "building_type",
    RuleKind::Text(&[Field::BuildingType]),
    &[BUILDING_TYPE],
);
const CEILING_ANY: Rule = rule(
    "ceiling_height",
    RuleKind::Text(&[Field::CeilingDetails, Field::CeilingShort]),
    &[CEILING],
);

const APARTMENT_SELL_COLUMNS: &[&str] = &[
    LINK, ROOMS, AREA, FLOOR, TOTAL_FLOORS, FLOOR_CATEGORY, PRICE_PER_AREA, PRICE, DISTRICT,
    ADDRESS, COMPLEX, BUILDING_TYPE, YEAR, YEAR_CATEGORY, CONDITION, CEILING, BATHROOM, SELLER,
];

const APARTMENT_RENT_COLUMNS: &[&str] = &[
    LINK, ROOMS, AREA, FLOOR, TOTAL_FLOORS, FLOOR_CATEGORY, PRICE_PER_AREA, RENT_PRICE,
    DISTRICT, ADDRESS, COMPLEX, BUILDING_TYPE, YEAR, YEAR_CATEGORY, CONDITION, CEILING,
    BATHROOM, SELLER,
];

const COMMERCE_COLUMNS: &[&str] = &[
    LINK, AREA, FLOORS, PRICE_PER_AREA, PRICE, DISTRICT, ADDRESS, PLACEMENT, OBJECT_NAME, YEAR,
    YEAR_CATEGORY, CONDITION, CEILING, OPERATING_BUSINESS, COMMUNICATIONS, LOCATION_LINE,
    SECURITY, FREE_LAYOUT, ENTRANCE, PARKING, ALLOCATED_POWER, SELLER,
];

static APARTMENT_SELL: RuleSet = RuleSet {
    variant: ListingVariant::ApartmentSell,
    columns: APARTMENT_SELL_COLUMNS,
    rules: &[
        LINK_RULE,
        rule("area", RuleKind::Area(&[Field::LiveSquare]), &[AREA]),
        ROOMS_RULE,
        rule(
            "floor",
            RuleKind::Floor {
                fields: &[Field::FlatFloor],
                bare_digit: true,
            },
            &[FLOOR, TOTAL_FLOORS, FLOOR_CATEGORY],
        ),
        APARTMENT_DISTRICT,
        TITLE_ADDRESS,
        COMPLEX_RULE,
        BUILDING_RULE,
        YEAR_RULE,
        rule("condition", RuleKind::Text(&[Field::Renovation]), &[CONDITION]),
        CEILING_ANY,
        TOILET_RULE,
        SELLER_RULE,
        rule(
            "price",
            RuleKind::Price(&[Field::Price]),
            &[PRICE, PRICE_PER_AREA],
        ),
    ],
};

static APARTMENT_RENT: RuleSet = RuleSet {
    variant: ListingVariant::ApartmentRent,
    columns: APARTMENT_RENT_COLUMNS,
    rules: &[
        LINK_RULE,
        rule("area", RuleKind::Area(&[Field::LiveSquare]), &[AREA]),
        ROOMS_RULE,
        rule(
            "floor",
            RuleKind::Floor {
                fields: &[Field::FlatFloor],
                bare_digit: false,
            },
            &[FLOOR, TOTAL_FLOORS, FLOOR_CATEGORY],
        ),
        APARTMENT_DISTRICT,
        TITLE_ADDRESS,
        COMPLEX_RULE,
        BUILDING_RULE,
        YEAR_RULE,
        rule(
            "condition",
            RuleKind::Text(&[Field::RentRenovation]),
            &[CONDITION],
        ),
        rule(
            "ceiling_height",
            RuleKind::Text(&[Field::CeilingDetails]),
            &[CEILING],
        ),
        TOILET_RULE,
        SELLER_RULE,
        rule(
            "price",
            RuleKind::Price(&[Field::Price]),
            &[RENT_PRICE, PRICE_PER_AREA],
        ),
    ],
};

const COMMERCE_FLOORS: Rule = rule(
    "floor",
    RuleKind::Text(&[Field::HouseFloorCount, Field::FlatFloor]),
    &[FLOORS],
);

/// Commerce rules after area, district and address, shared by sell and rent
const COMMERCE_TAIL: [Rule; 15] = [
    rule(
        "object_placement",
        RuleKind::Text(&[Field::CommercePlacement]),
        &[PLACEMENT],
    ),
    rule(
        "object_name",
        RuleKind::Text(&[Field::ComplexName]),
        &[OBJECT_NAME],
    ),
    YEAR_RULE,
    rule(
        "condition",
        RuleKind::Text(&[Field::CommerceRenovation]),
        &[CONDITION],
    ),
    CEILING_ANY,
    rule(
        "operating_business",
        RuleKind::Text(&[Field::OperatingBusiness]),
        &[OPERATING_BUSINESS],
    ),
    rule(
        "communications",
        RuleKind::Text(&[Field::Communications]),
        &[COMMUNICATIONS],
    ),
    rule(
        "location_line",
        RuleKind::Text(&[Field::LocationLine]),
        &[LOCATION_LINE],
    ),
    rule("security", RuleKind::Text(&[Field::Security]), &[SECURITY]),
    rule(
        "free_layout",
        RuleKind::Text(&[Field::CustomLayout]),
        &[FREE_LAYOUT],
    ),
    rule("entrance", RuleKind::Text(&[Field::Entrance]), &[ENTRANCE]),
    rule("parking", RuleKind::Text(&[Field::Parking]), &[PARKING]),
    rule(
        "allocated_power",
        RuleKind::Text(&[Field::AllocatedPower]),
        &[ALLOCATED_POWER],
    ),
    SELLER_RULE,
    rule(
        "price",
        RuleKind::Price(&[Field::CommercePrice]),
        &[PRICE, PRICE_PER_AREA],
    ),
];

const fn commerce_rules(area: Rule, district: Rule, address: Rule) -> [Rule; 20] {
    let tail = COMMERCE_TAIL;
    let mut rules = [LINK_RULE; 20];
    rules[1] = area;
    rules[2] = COMMERCE_FLOORS;
    rules[3] = district;
    rules[4] = address;
    let mut i = 0;
    while i < tail.len() {
        rules[5 + i] = tail[i];
        i += 1;
    }
    rules
}

const COMMERCE_SELL_RULES: [Rule; 20] = commerce_rules(
    rule(
        "area",
        RuleKind::Area(&[Field::LiveSquare, Field::CommerceSquare]),
        &[AREA],
    ),
    rule(
        "district",
        RuleKind::District {
            fields: &[Field::Location],
            pick: SegmentPick::Second,
        },
        &[DISTRICT],
    ),
    rule(
        "address",
        RuleKind::Address {
            fields: &[Field::Street],
            keep_plain: false,
        },
        &[ADDRESS],
    ),
);

const COMMERCE_RENT_RULES: [Rule; 20] = commerce_rules(
    rule("area", RuleKind::Area(&[Field::CommerceSquare]), &[AREA]),
    rule(
        "district",
        RuleKind::District {
            fields: &[Field::Location],
            pick: SegmentPick::Last,
        },
        &[DISTRICT],
    ),
    rule(
        "address",
        RuleKind::Address {
            fields: &[Field::Street],
            keep_plain: true,
        },
        &[ADDRESS],
    ),
);

static COMMERCE_SELL: RuleSet = RuleSet {
    variant: ListingVariant::CommerceSell,
    columns: COMMERCE_COLUMNS,
    rules: &COMMERCE_SELL_RULES,
};

static COMMERCE_RENT: RuleSet = RuleSet {
    variant: ListingVariant::CommerceRent,
    columns: COMMERCE_COLUMNS,
    rules: &COMMERCE_RENT_RULES,
};

pub fn rule_set(variant: ListingVariant) -> &'static RuleSet {
    match variant {
        ListingVariant::ApartmentSell => &APARTMENT_SELL,
        ListingVariant::ApartmentRent => &APARTMENT_RENT,
        ListingVariant::CommerceSell => &COMMERCE_SELL,
        ListingVariant::CommerceRent => &COMMERCE_RENT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const VARIANTS: [ListingVariant; 4] = [
        ListingVariant::ApartmentSell,
        ListingVariant::ApartmentRent,
        ListingVariant::CommerceSell,
        ListingVariant::CommerceRent,
    ];

    #[test]
    fn test_every_column_filled_by_exactly_one_rule() {
        for variant in VARIANTS {
            let set = rule_set(variant);
            assert_eq!(set.variant, variant);

            let mut produced = Vec::new();
            for rule in set.rules {
                assert_eq!(
                    rule.kind.arity(),
                    rule.columns.len(),
                    "{variant}: rule {}",
                    rule.name
                );
                produced.extend_from_slice(rule.columns);
            }

            let unique: HashSet<_> = produced.iter().collect();
            assert_eq!(unique.len(), produced.len(), "{variant}: duplicate column");
            let schema: HashSet<_> = set.columns.iter().collect();
            assert_eq!(unique, schema, "{variant}: schema mismatch");
        }
    }

    #[test]
    fn test_area_runs_before_price() {
        for variant in VARIANTS {
            let rules = rule_set(variant).rules;
            let area = rules.iter().position(|r| matches!(r.kind, RuleKind::Area(_)));
            let price = rules.iter().position(|r| matches!(r.kind, RuleKind::Price(_)));
            assert!(area.unwrap() < price.unwrap(), "{variant}");
        }
    }

    #[test]
    fn test_commerce_variants_differ_only_in_documented_rules() {
        let sell = rule_set(ListingVariant::CommerceSell).rules;
        let rent = rule_set(ListingVariant::CommerceRent).rules;

        let district_pick = |rules: &[Rule]| {
            rules.iter().find_map(|r| match r.kind {
                RuleKind::District { pick, .. } => Some(pick),
                _ => None,
            })
        };
        assert_eq!(district_pick(sell), Some(SegmentPick::Second));
        assert_eq!(district_pick(rent), Some(SegmentPick::Last));

        let names = |rules: &[Rule]| rules.iter().map(|r| r.name).collect::<Vec<_>>();
        assert_eq!(names(sell), names(rent));
    }

    #[test]
    fn test_catalog_concatenates_in_order() {
        let catalog = SelectorCatalog::default();
        let list = catalog.candidates(&[Field::HouseFloorCount, Field::FlatFloor]);
        assert_eq!(list.len(), 2);
        assert!(list[0].selector.contains("house.floor_num"));
        assert!(list[1].selector.contains("flat.floor"));
    }
}
