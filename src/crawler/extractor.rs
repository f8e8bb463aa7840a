//! Record extraction from loaded pages
//!
//! These functions run against an already-parsed document and never touch
//! the network, so they are tested against static HTML fixtures.
//!
//! - Property-record pages: one [`PropertyRow`] per results-table row
//! - County street indexes: town links
//! - Town street indexes: road names

use crate::storage::{PropertyRecord, Road};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Rows of the property results table
const PROPERTY_ROWS: &str = "#property-records-by table tbody tr";

/// Town links on a county street index
const TOWN_LINKS: &str = "div.listmain span.listspan ul li a";

/// Road links on a town street index
const ROAD_LINKS: &str = "div.listmain span.listspan a";

/// One scraped row of a property-records table
///
/// Cells are trimmed; an empty cell reads as None.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    pub full_address: Option<String>,
    /// Text before the first comma of the address, as parsed
    pub street_name: Option<String>,
    pub zip_code: Option<String>,
    pub market_value: Option<String>,
    pub year_built: Option<String>,
    pub last_sale: Option<String>,
}

impl PropertyRow {
    /// Attaches the row to the road being crawled
    ///
    /// The parsed street name is discarded in favour of the road's name.
    /// Rows without an address cannot be stored and yield None.
    pub fn into_record(self, road: &Road) -> Option<PropertyRecord> {
        let full_address = self.full_address?;

        Some(PropertyRecord {
            full_address,
            street_name: road.road_name.clone(),
            zip_code: self.zip_code,
            market_value: self.market_value,
            year_built: self.year_built,
            last_sale: self.last_sale,
            town: road.town.clone(),
            county: road.county.clone(),
            state: road.state.clone(),
        })
    }
}

/// A town entry on a county street index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownLink {
    pub name: String,
    pub href: String,
}

fn zip_pattern() -> &'static Regex {
    static ZIP: OnceLock<Regex> = OnceLock::new();
    ZIP.get_or_init(|| Regex::new(r"([0-9]{5})$").expect("zip pattern is a valid regex"))
}

/// Trailing five-digit run of an address
pub fn zip_code_of(address: &str) -> Option<String> {
    zip_pattern()
        .captures(address)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Address text before the first comma
pub fn street_of(address: &str) -> String {
    address.split(',').next().unwrap_or_default().to_string()
}

fn cell_text(cell: Option<&ElementRef<'_>>) -> Option<String> {
    cell.map(|c| c.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Extracts property rows from a results page
///
/// Reads up to four leading cells per row as (address, market value, year
/// built, last sale). Rows without cells are skipped; a page without the
/// results table yields nothing.
///
/// # Example
///
/// ```
/// use parcel_scout::crawler::extract_property_rows;
/// use scraper::Html;
///
/// let html = Html::parse_document(r#"
///     <div id="property-records-by"><table><tbody>
///         <tr><td>305 Kings Rd, Madison, NJ 07940</td><td>$450,000</td><td>1962</td><td>2019-05-01</td></tr>
///     </tbody></table></div>"#);
/// let rows = extract_property_rows(&html);
/// assert_eq!(rows[0].zip_code.as_deref(), Some("07940"));
/// ```
pub fn extract_property_rows(document: &Html) -> Vec<PropertyRow> {
    let (Ok(row_selector), Ok(cell_selector)) =
        (Selector::parse(PROPERTY_ROWS), Selector::parse("td"))
    else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).take(4).collect();
            if cells.is_empty() {
                return None;
            }

            let full_address = cell_text(cells.first());
            let zip_code = full_address.as_deref().and_then(zip_code_of);
            let street_name = full_address.as_deref().map(street_of);

            Some(PropertyRow {
                full_address,
                street_name,
                zip_code,
                market_value: cell_text(cells.get(1)),
                year_built: cell_text(cells.get(2)),
                last_sale: cell_text(cells.get(3)),
            })
        })
        .collect()
}

/// Extracts town links from a county street index
///
/// Keeps entries with a non-empty name whose href points at an `.html` page.
pub fn extract_town_links(document: &Html) -> Vec<TownLink> {
    let Ok(selector) = Selector::parse(TOWN_LINKS) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|anchor| {
            let name = anchor.text().collect::<String>().trim().to_string();
            let href = anchor.value().attr("href").unwrap_or_default().to_string();

            if name.is_empty() || !href.ends_with(".html") {
                return None;
            }

            Some(TownLink { name, href })
        })
        .collect()
}

/// Extracts road names from a town street index
///
/// Road entries link to the site's `view.php` street viewer.
pub fn extract_road_names(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(ROAD_LINKS) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|anchor| {
            anchor
                .value()
                .attr("href")
                .map_or(false, |href| href.contains("view.php"))
        })
        .map(|anchor| anchor.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
