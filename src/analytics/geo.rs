//! Country name to ISO 3166-1 alpha-3 mapping for map charts.
//!
//! Names are as they appear in the source dataset. Regions with no single
//! country code map to `None`.

const ISO_ALPHA3: &[(&str, Option<&str>)] = &[
    ("United Kingdom", Some("GBR")),
    ("France", Some("FRA")),
    ("Germany", Some("DEU")),
    ("Spain", Some("ESP")),
    ("Portugal", Some("PRT")),
    ("Italy", Some("ITA")),
    ("Netherlands", Some("NLD")),
    ("Belgium", Some("BEL")),
    ("Switzerland", Some("CHE")),
    ("Austria", Some("AUT")),
    ("Norway", Some("NOR")),
    ("Sweden", Some("SWE")),
    ("Denmark", Some("DNK")),
    ("Finland", Some("FIN")),
    ("Ireland", Some("IRL")),
    ("Poland", Some("POL")),
    ("Greece", Some("GRC")),
    ("Australia", Some("AUS")),
    ("Japan", Some("JPN")),
    ("USA", Some("USA")),
    ("Canada", Some("CAN")),
    ("Brazil", Some("BRA")),
    ("Singapore", Some("SGP")),
    ("Hong Kong", Some("HKG")),
    ("United Arab Emirates", Some("ARE")),
    ("Israel", Some("ISR")),
    ("Cyprus", Some("CYP")),
    ("Malta", Some("MLT")),
    ("Iceland", Some("ISL")),
    ("Czech Republic", Some("CZE")),
    ("Lithuania", Some("LTU")),
    ("Channel Islands", Some("GBR")),
    ("EIRE", Some("IRL")),
    ("RSA", Some("ZAF")),
    ("Saudi Arabia", Some("SAU")),
    ("Bahrain", Some("BHR")),
    ("Lebanon", Some("LBN")),
    ("European Community", None),
    ("Unspecified", None),
];

/// ISO alpha-3 code for a dataset country name.
pub fn iso_alpha3(country: &str) -> Option<&'static str> {
    ISO_ALPHA3
        .iter()
        .find(|(name, _)| *name == country)
        .and_then(|(_, code)| *code)
}
