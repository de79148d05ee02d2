//! Assembly of the output rows.

use std::collections::BTreeMap;

use voucher_map_enrich::UnitEnrichment;
use voucher_map_geocoder::GeocodedUnit;
use voucher_map_housing_models::LocatorRecord;
use voucher_map_landlord::LandlordFlags;

/// Joins every per-unit result by unit id into output rows.
///
/// `geocoded` and `enrichment` are parallel. A unit with no transit row
/// (it had no usable location) gets zero counts. A unit with no landlord
/// row is unflagged.
#[must_use]
pub fn locator_records(
    geocoded: &[GeocodedUnit],
    enrichment: &[UnitEnrichment],
    transit: &BTreeMap<String, Vec<u32>>,
    landlords: &LandlordFlags,
) -> Vec<LocatorRecord> {
    let mut records: Vec<LocatorRecord> = geocoded
        .iter()
        .zip(enrichment)
        .map(|(g, e)| {
            let unit = &g.unit;
            let counts = transit.get(&unit.id).map_or(&[][..], Vec::as_slice);
            let count = |band: usize| counts.get(band).copied().unwrap_or(0);
            let flag = landlords.get(&unit.id);

            LocatorRecord {
                unit_id: unit.id.clone(),
                address: unit.address.clone(),
                monthly_rent: unit.monthly_rent,
                property_type: unit.property_type,
                bathrooms: unit.bathrooms,
                bedrooms: unit.bedrooms,
                availability: unit.availability.clone(),
                contact: unit.contact.clone(),
                url: unit.url.clone(),
                latitude: unit.coordinates.map(|c| c.latitude),
                longitude: unit.coordinates.map(|c| c.longitude),
                geoid: g.geoid.clone(),
                state: e.state.clone(),
                county: e.county.clone(),
                city: e.city.clone(),
                neighborhood: g.neighborhood.clone(),
                region_id: g.region_id.clone(),
                parent_location: e.parent_location.clone(),
                population: e.profile.population,
                renter_occupied_households: e.profile.renter_occupied_households,
                median_gross_rent: e.profile.median_gross_rent,
                median_household_income: e.profile.median_household_income,
                median_property_value: e.profile.median_property_value,
                pct_white: e.profile.pct_white,
                pct_af_am: e.profile.pct_af_am,
                pct_hispanic: e.profile.pct_hispanic,
                pct_am_ind: e.profile.pct_am_ind,
                pct_asian: e.profile.pct_asian,
                eviction_filings: e.profile.eviction_filings,
                evictions: e.profile.evictions,
                eviction_rate: e.eviction_rate,
                eviction_rate_percentile: e.eviction_rate_percentile,
                eviction_filing_rate: e.eviction_filing_rate,
                eviction_filing_rate_percentile: e.eviction_filing_rate_percentile,
                rent_change_2011_2015: e.rent_change_early,
                rent_change_2015_2019: e.rent_change_late,
                potential_bad_landlord: flag.is_some_and(|f| f.potential_bad_landlord),
                bad_landlord_address: flag.and_then(|f| f.bad_landlord_address.clone()),
                stops_within_quarter_mile: count(0),
                stops_within_half_mile: count(1),
                stops_within_three_quarter_mile: count(2),
                stops_within_one_mile: count(3),
            }
        })
        .collect();

    records.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
    records
}
