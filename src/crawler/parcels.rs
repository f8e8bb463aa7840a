//! Statewide parcel layer queries
//!
//! The parcel layer is an ArcGIS feature service. Each municipality is one
//! query filtered on its `muni_fips`; the JSON response carries one
//! `attributes` object per parcel.

use crate::storage::ParcelRecord;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Attributes requested from the parcel layer
pub const PARCEL_OUT_FIELDS: &str = "OBJECTID,PCL_MUN,PCLBLOCK,PCLLOT,CD_CODE,PROP_CLASS,COUNTY,\
     MUN_NAME,PROP_LOC,ST_ADDRESS,CITY_STATE,LAND_VAL,IMPRVT_VAL,NET_VALUE,LAST_YR_TX,BLDG_DESC,\
     LAND_DESC,CALC_ACRE,FAC_NAME,PROP_USE,BLDG_CLASS,DEED_BOOK,DEED_PAGE,DEED_DATE,YR_CONSTR,\
     SALES_CODE,SALE_PRICE,DWELL,COMM_DWELL";

/// New Jersey property class codes and their descriptions
const PROPERTY_CLASSES: [(&str, &str); 15] = [
    ("1", "Vacant Land"),
    ("2", "Residential Property"),
    ("3A", "Farm (Regular)"),
    ("3B", "Farm (Qualified)"),
    ("4A", "Commercial Property"),
    ("4B", "Industrial Property"),
    ("4C", "Apartments (5+ units)"),
    ("5A", "Railroad Class I"),
    ("5B", "Railroad Class II"),
    ("15A", "Public School (exempt)"),
    ("15B", "Other School Property (exempt)"),
    ("15C", "Public Property (exempt)"),
    ("15D", "Church & Charitable (exempt)"),
    ("15E", "Cemeteries & Graveyards (exempt)"),
    ("15F", "Other Exempt"),
];

/// Why a parcel query response could not be used
#[derive(Debug, Error)]
pub enum ParcelQueryError {
    #[error("Response is not a feature set: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parcel service error {code}: {message}")]
    Service { code: i64, message: String },
}

/// Parcels parsed from one query response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelPage {
    pub parcels: Vec<ParcelRecord>,
    /// The service held back matching parcels beyond the requested count
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    exceeded_transfer_limit: bool,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Builds the query URL for one municipality
///
/// # Examples
///
/// ```
/// use parcel_scout::crawler::parcel_query_url;
///
/// let url = parcel_query_url("https://gis.example.com/FeatureServer/0/query", "1417", 50).unwrap();
/// let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
/// assert!(pairs.contains(&(
///     "where".to_string(),
///     "(PCL_MUN LIKE '14%') AND (PCL_MUN = '1417')".to_string()
/// )));
/// assert!(pairs.contains(&("resultRecordCount".to_string(), "50".to_string())));
/// ```
pub fn parcel_query_url(
    endpoint: &str,
    muni_fips: &str,
    page_size: u32,
) -> Result<Url, url::ParseError> {
    let county_prefix: String = muni_fips.chars().take(2).collect();
    let filter = format!(
        "(PCL_MUN LIKE '{}%') AND (PCL_MUN = '{}')",
        county_prefix, muni_fips
    );

    let mut url = Url::parse(endpoint)?;
    url.query_pairs_mut()
        .append_pair("f", "json")
        .append_pair("where", &filter)
        .append_pair("returnGeometry", "false")
        .append_pair("spatialRel", "esriSpatialRelIntersects")
        .append_pair("outFields", PARCEL_OUT_FIELDS)
        .append_pair("outSR", "102100")
        .append_pair("resultOffset", "0")
        .append_pair("resultRecordCount", &page_size.to_string());

    Ok(url)
}

/// Describes a property class code, or `Unknown`
pub fn property_class_description(code: &str) -> &'static str {
    let code = code.trim();
    PROPERTY_CLASSES
        .iter()
        .find(|(class, _)| class.eq_ignore_ascii_case(code))
        .map(|(_, description)| *description)
        .unwrap_or("Unknown")
}

/// The road part of a situs address: everything after the first space
///
/// An address without a space is returned whole.
pub fn address_road(address: &str) -> &str {
    match address.split_once(' ') {
        Some((_, road)) => road.trim(),
        None => address,
    }
}

/// Parses a query response for the municipality `muni_fips`
///
/// Parcels without a `PCL_MUN` attribute are attributed to `muni_fips`.
pub fn extract_parcels(body: &str, muni_fips: &str) -> Result<ParcelPage, ParcelQueryError> {
    let response: QueryResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(ParcelQueryError::Service {
            code: error.code,
            message: error.message,
        });
    }

    let parcels = response
        .features
        .into_iter()
        .map(|feature| parcel_from_attributes(&feature.attributes, muni_fips))
        .collect();

    Ok(ParcelPage {
        parcels,
        truncated: response.exceeded_transfer_limit,
    })
}

fn parcel_from_attributes(attrs: &Map<String, Value>, muni_fips: &str) -> ParcelRecord {
    let property_class = text(attrs, "PROP_CLASS");
    let address = text(attrs, "PROP_LOC");

    ParcelRecord {
        objectid: integer(attrs, "OBJECTID"),
        muni_fips: text(attrs, "PCL_MUN").unwrap_or_else(|| muni_fips.to_string()),
        block: text(attrs, "PCLBLOCK"),
        lot: text(attrs, "PCLLOT"),
        qualifier: text(attrs, "CD_CODE"),
        property_description: property_class
            .as_deref()
            .map_or("Unknown", property_class_description)
            .to_string(),
        property_class,
        county_name: text(attrs, "COUNTY"),
        municipality_name: text(attrs, "MUN_NAME"),
        address_road: address.as_deref().map(|a| address_road(a).to_string()),
        address,
        owner_address: text(attrs, "ST_ADDRESS"),
        owner_city_state: text(attrs, "CITY_STATE"),
        land_value: number(attrs, "LAND_VAL"),
        improvement_value: number(attrs, "IMPRVT_VAL"),
        net_value: number(attrs, "NET_VALUE"),
        last_year_taxes: number(attrs, "LAST_YR_TX"),
        sale_price: number(attrs, "SALE_PRICE"),
        year_constructed: text(attrs, "YR_CONSTR"),
        building_description: text(attrs, "BLDG_DESC"),
        land_description: text(attrs, "LAND_DESC"),
        calculated_acres: number(attrs, "CALC_ACRE"),
        building_class: text(attrs, "BLDG_CLASS"),
        deed_book: text(attrs, "DEED_BOOK"),
        deed_page: text(attrs, "DEED_PAGE"),
        deed_date: text(attrs, "DEED_DATE"),
        dwellings: integer(attrs, "DWELL"),
        commercial_dwellings: integer(attrs, "COMM_DWELL"),
    }
}

// The layer mixes string and numeric encodings for the same field across counties

fn text(attrs: &Map<String, Value>, key: &str) -> Option<String> {
    match attrs.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(attrs: &Map<String, Value>, key: &str) -> Option<f64> {
    match attrs.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

fn integer(attrs: &Map<String, Value>, key: &str) -> Option<i64> {
    match attrs.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
