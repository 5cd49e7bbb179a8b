use crate::models::{FieldValue, ListingVariant, Table, TableError};
use crate::scrapers::fields;
use crate::scrapers::locator::{resolve, Locator, Lookup};
use crate::scrapers::rules::{rule_set, Field, Rule, RuleKind, RuleSet, SelectorCatalog};
use crate::scrapers::traits::{DriverError, PageDriver};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Table(#[from] TableError),
}

impl ExtractError {
    pub fn is_fatal(&self) -> bool {
        match self {
            ExtractError::Driver(e) => e.is_fatal(),
            ExtractError::Table(_) => false,
        }
    }
}

/// Runs one variant's rule table against listing pages.
pub struct ListingExtractor {
    rules: &'static RuleSet,
    /// Candidate list per rule, same index as `rules.rules`
    candidates: Vec<Vec<Locator>>,
    timeout: Duration,
}

impl ListingExtractor {
    pub fn new(variant: ListingVariant, catalog: &SelectorCatalog, timeout: Duration) -> Self {
        let rules = rule_set(variant);
        let candidates = rules
            .rules
            .iter()
            .map(|rule| catalog.candidates(source_fields(rule)))
            .collect();

        Self {
            rules,
            candidates,
            timeout,
        }
    }

    pub fn variant(&self) -> ListingVariant {
        self.rules.variant
    }

    /// Empty table with this variant's schema
    pub fn new_table(&self) -> Table {
        Table::new(self.rules.columns.iter().copied())
    }

    /// Open `link` and append one cell per column to `table`.
    ///
    /// Navigation failures append nothing. A session loss part way through
    /// leaves the cells of earlier rules in place; `Table::align` pads them
    /// before the next flush.
    pub fn parse_page<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        link: &str,
        table: &mut Table,
    ) -> Result<(), ExtractError> {
        driver.navigate(link)?;

        let mut area = None;
        for (rule, candidates) in self.rules.rules.iter().zip(&self.candidates) {
            let mut cells = self.apply(driver, rule, candidates, link, &mut area)?;
            if cells.iter().all(FieldValue::is_missing) {
                debug!("No {} on {}", rule.name, link);
            }
            cells.resize(rule.columns.len(), FieldValue::Missing);

            for (column, value) in rule.columns.iter().zip(cells) {
                table.append(column, value)?;
            }
        }

        debug!("Parsed {} listing {}", self.rules.variant, link);
        Ok(())
    }

    fn apply<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        rule: &Rule,
        candidates: &[Locator],
        link: &str,
        area: &mut Option<f64>,
    ) -> Result<Vec<FieldValue>, ExtractError> {
        if let RuleKind::Link = rule.kind {
            return Ok(vec![FieldValue::text(link)]);
        }

        let raw = match resolve(driver, candidates, self.timeout) {
            Lookup::Failed(e) => return Err(e.into()),
            lookup => lookup.into_value(),
        };

        let cells = match rule.kind {
            RuleKind::Link | RuleKind::Text(_) => vec![raw],
            RuleKind::Rooms(_) => vec![fields::room_count(&raw)],
            RuleKind::Area(_) => {
                let value = fields::area(&raw);
                *area = value.as_number();
                vec![value]
            }
            RuleKind::Floor { bare_digit, .. } => fields::floor(&raw, bare_digit).to_vec(),
            RuleKind::ConstructionYear(_) => {
                let category = fields::year_category(&raw);
                vec![raw, category]
            }
            RuleKind::District { pick, .. } => vec![fields::district(&raw, pick)],
            RuleKind::Address { keep_plain, .. } => vec![fields::address(&raw, keep_plain)],
            RuleKind::Price(_) => {
                let (price, per_area) = fields::price(&raw, *area);
                vec![price, per_area]
            }
        };
        Ok(cells)
    }
}

fn source_fields(rule: &Rule) -> &'static [Field] {
    match rule.kind {
        RuleKind::Link => &[],
        RuleKind::Text(f)
        | RuleKind::Rooms(f)
        | RuleKind::Area(f)
        | RuleKind::ConstructionYear(f)
        | RuleKind::Price(f) => f,
        RuleKind::Floor { fields, .. }
        | RuleKind::District { fields, .. }
        | RuleKind::Address { fields, .. } => fields,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::scrapers::rules::columns;
    use crate::scrapers::snapshot::HtmlSnapshotDriver;

    pub(crate) const APARTMENT_PAGE: &str = r#"
        <html><body>
            <div class="offer__advert-title"><h1>2-комнатная квартира, 60 м², мкр Самал-2 58</h1></div>
            <div class="offer__price">1 200 000 〒</div>
            <div class="offer__location offer__advert-short-info"><span>Алматы, Медеуский р-н, мкр Самал-2</span></div>
            <div data-name="live.square"><div class="offer__advert-short-info">60 м²</div></div>
            <div data-name="flat.floor"><div class="offer__advert-short-info">4 из 9</div></div>
            <div data-name="map.complex"><div class="offer__advert-short-info">Самал Тауэрс</div></div>
            <div data-name="flat.building"><div class="offer__advert-short-info">монолитный</div></div>
            <div data-name="house.year"><div class="offer__advert-short-info">2008</div></div>
            <div data-name="flat.renovation"><div class="offer__advert-short-info">свежий ремонт</div></div>
            <dl>
                <dt data-name="ceiling">Потолки</dt><dd>2.8 м</dd>
                <dt data-name="flat.toilet">Санузел</dt><dd>раздельный</dd>
            </dl>
            <div class="owners__labels-list">Хозяин недвижимости</div>
        </body></html>
    "#;

    pub(crate) const COMMERCE_PAGE: &str = r#"
        <html><body>
            <div class="offer__advert-title"><h1>Офис, 120 м²</h1></div>
            <div class="offer__price"><span class="offer__price-part">600 000 〒</span><span class="offer__price-part">за месяц</span></div>
            <div class="offer__location offer__advert-short-info"><span>Алматы, Бостандыкский р-н, Тимирязева 42</span></div>
            <div data-name="com.square"><div class="offer__advert-short-info">120 м²</div></div>
            <div data-name="house.floor_num"><div class="offer__advert-short-info">2 этаж из 5</div></div>
            <div data-name="map.street"><div class="offer__advert-short-info">Тимирязева 42</div></div>
            <div data-name="house.year"><div class="offer__advert-short-info">1990</div></div>
            <dl>
                <dt data-name="com.security">Безопасность</dt><dd>охрана, видеонаблюдение</dd>
                <dt data-name="com.parking_opts">Парковка</dt><dd>рядом</dd>
            </dl>
        </body></html>
    "#;

    const LINK: &str = "https://krisha.kz/a/show/100";

    fn extractor(variant: ListingVariant) -> ListingExtractor {
        ListingExtractor::new(variant, &SelectorCatalog::default(), Duration::ZERO)
    }

    fn cell<'a>(table: &'a Table, column: &str) -> &'a FieldValue {
        &table.column(column).unwrap()[0]
    }

    #[test]
    fn test_apartment_sell_listing() {
        let extractor = extractor(ListingVariant::ApartmentSell);
        let mut driver = HtmlSnapshotDriver::new().with_page(LINK, APARTMENT_PAGE);
        let mut table = extractor.new_table();

        extractor.parse_page(&mut driver, LINK, &mut table).unwrap();

        assert_eq!(table.max_len(), 1);
        assert_eq!(table.align(), 1);
        assert_eq!(cell(&table, columns::LINK), &FieldValue::text(LINK));
        assert_eq!(cell(&table, columns::ROOMS), &FieldValue::Number(2.0));
        assert_eq!(cell(&table, columns::AREA), &FieldValue::Number(60.0));
        assert_eq!(cell(&table, columns::FLOOR), &FieldValue::Number(4.0));
        assert_eq!(cell(&table, columns::TOTAL_FLOORS), &FieldValue::Number(9.0));
        assert_eq!(
            cell(&table, columns::FLOOR_CATEGORY),
            &FieldValue::text("Средние этажи")
        );
        assert_eq!(cell(&table, columns::PRICE), &FieldValue::Number(1_200_000.0));
        assert_eq!(
            cell(&table, columns::PRICE_PER_AREA),
            &FieldValue::Number(20000.0)
        );
        assert_eq!(
            cell(&table, columns::DISTRICT),
            &FieldValue::text("Медеуский р-н")
        );
        assert_eq!(
            cell(&table, columns::ADDRESS),
            &FieldValue::text("мкр Самал-2 58")
        );
        assert_eq!(
            cell(&table, columns::YEAR_CATEGORY),
            &FieldValue::text("2000-2010")
        );
        assert_eq!(cell(&table, columns::CEILING), &FieldValue::text("2.8 м"));
        assert_eq!(cell(&table, columns::BATHROOM), &FieldValue::text("раздельный"));
        assert_eq!(
            cell(&table, columns::SELLER),
            &FieldValue::text("Хозяин недвижимости")
        );
    }

    #[test]
    fn test_commerce_rent_asymmetries() {
        let mut driver = HtmlSnapshotDriver::new().with_page(LINK, COMMERCE_PAGE);

        let rent = extractor(ListingVariant::CommerceRent);
        let mut rent_table = rent.new_table();
        rent.parse_page(&mut driver, LINK, &mut rent_table).unwrap();

        let sell = extractor(ListingVariant::CommerceSell);
        let mut sell_table = sell.new_table();
        sell.parse_page(&mut driver, LINK, &mut sell_table).unwrap();

        assert_eq!(
            cell(&rent_table, columns::DISTRICT),
            &FieldValue::text("Тимирязева 42")
        );
        assert_eq!(
            cell(&sell_table, columns::DISTRICT),
            &FieldValue::text("Бостандыкский р-н")
        );

        // comma-free street text survives only for commerce rent
        assert_eq!(
            cell(&rent_table, columns::ADDRESS),
            &FieldValue::text("Тимирязева 42")
        );
        assert_eq!(cell(&sell_table, columns::ADDRESS), &FieldValue::Missing);

        assert_eq!(
            cell(&rent_table, columns::FLOORS),
            &FieldValue::text("2 этаж из 5")
        );
        assert_eq!(cell(&rent_table, columns::PRICE), &FieldValue::Number(600_000.0));
        assert_eq!(
            cell(&rent_table, columns::PRICE_PER_AREA),
            &FieldValue::Number(5000.0)
        );
        assert_eq!(
            cell(&rent_table, columns::YEAR_CATEGORY),
            &FieldValue::text("1980-1990")
        );
        assert_eq!(
            cell(&rent_table, columns::SECURITY),
            &FieldValue::text("охрана, видеонаблюдение")
        );
        assert_eq!(cell(&rent_table, columns::ENTRANCE), &FieldValue::Missing);
    }

    #[test]
    fn test_apartment_rent_reads_only_rent_fields() {
        // ceiling only in the short-info block, condition only as flat.renovation
        const PAGE: &str = r#"
            <html><body>
                <div data-name="ceiling"><div class="offer__advert-short-info">2.7 м</div></div>
                <div data-name="flat.renovation"><div class="offer__advert-short-info">евроремонт</div></div>
            </body></html>
        "#;
        let mut driver = HtmlSnapshotDriver::new().with_page(LINK, PAGE);

        let rent = extractor(ListingVariant::ApartmentRent);
        let mut rent_table = rent.new_table();
        rent.parse_page(&mut driver, LINK, &mut rent_table).unwrap();

        let sell = extractor(ListingVariant::ApartmentSell);
        let mut sell_table = sell.new_table();
        sell.parse_page(&mut driver, LINK, &mut sell_table).unwrap();

        assert_eq!(cell(&rent_table, columns::CEILING), &FieldValue::Missing);
        assert_eq!(cell(&rent_table, columns::CONDITION), &FieldValue::Missing);
        assert_eq!(cell(&sell_table, columns::CEILING), &FieldValue::text("2.7 м"));
        assert_eq!(
            cell(&sell_table, columns::CONDITION),
            &FieldValue::text("евроремонт")
        );
    }

    #[test]
    fn test_empty_page_still_fills_every_column() {
        let extractor = extractor(ListingVariant::ApartmentRent);
        let mut driver = HtmlSnapshotDriver::new().with_page(LINK, "<html></html>");
        let mut table = extractor.new_table();

        extractor.parse_page(&mut driver, LINK, &mut table).unwrap();
        extractor.parse_page(&mut driver, LINK, &mut table).unwrap();

        for name in table.column_names() {
            assert_eq!(table.column(name).unwrap().len(), 2, "{name}");
        }
        assert_eq!(cell(&table, columns::RENT_PRICE), &FieldValue::Missing);
    }

    #[test]
    fn test_navigation_failure_appends_nothing() {
        let extractor = extractor(ListingVariant::ApartmentSell);
        let mut driver = HtmlSnapshotDriver::new().with_broken_page(LINK);
        let mut table = extractor.new_table();

        let err = extractor.parse_page(&mut driver, LINK, &mut table).unwrap_err();

        assert!(!err.is_fatal());
        assert!(table.is_empty());
    }

    #[test]
    fn test_session_loss_leaves_partial_row() {
        let extractor = extractor(ListingVariant::ApartmentSell);
        let mut driver = HtmlSnapshotDriver::new().with_page(LINK, APARTMENT_PAGE);
        let mut table = extractor.new_table();
        // navigation plus the area and rooms lookups succeed
        driver.kill_session_after(3);

        let err = extractor.parse_page(&mut driver, LINK, &mut table).unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(table.column(columns::AREA).unwrap().len(), 1);
        assert_eq!(table.column(columns::ROOMS).unwrap().len(), 1);
        assert!(table.column(columns::SELLER).unwrap().is_empty());

        table.align();
        assert_eq!(cell(&table, columns::SELLER), &FieldValue::Missing);
    }
}
