// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service category taxonomy and merchant category codes.

/// Code used for empty, missing or unknown categories.
pub const FALLBACK_MCC: &str = "5999";

/// Top-level categories with their subcategories, in display order.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Handwerk",
        &[
            "Tischler",
            "Klempner",
            "Maler & Lackierer",
            "Elektriker",
            "Heizungsbau & Sanitär",
            "Fliesenleger",
            "Dachdecker",
            "Maurer",
            "Trockenbauer",
            "Schreiner",
            "Zimmerer",
            "Bodenleger",
            "Glaser",
            "Schlosser",
            "Metallbauer",
            "Fenster- & Türenbauer",
        ],
    ),
    (
        "Haushalt & Reinigung",
        &[
            "Reinigungskraft",
            "Garten und Landschaftspflege",
            "Haushaltshilfe",
            "Fensterputzer",
            "Umzugshelfer",
            "Entrümpelung",
            "Hausmeisterdienste",
            "Teppichreinigung",
            "Bodenreinigung",
            "Hausreinigung",
        ],
    ),
    (
        "Transport & Logistik",
        &[
            "Möbelmontage",
            "Umzugshelfer",
            "Fahrer",
            "Kurierdienste",
            "Transportdienstleistungen",
            "Lagerlogistik",
            "Frachtführer",
            "Speditionsdienstleistungen",
            "Kurierfahrer",
            "Frachtlogistik",
        ],
    ),
    ("Hotel & Gastronomie", &["Mietkoch", "Mietkellner"]),
    (
        "IT & Technik",
        &[
            "Webentwicklung",
            "Softwareentwicklung",
            "App-Entwicklung",
            "IT-Support",
            "Netzwerkadministration",
            "Datenbankentwicklung",
            "IT-Beratung",
            "Webdesign",
            "UX/UI Design",
            "Systemintegration",
            "Cloud Computing",
            "Cybersecurity",
        ],
    ),
    (
        "Marketing & Vertrieb",
        &[
            "Online Marketing",
            "Social Media Marketing",
            "Content Marketing",
        ],
    ),
    (
        "Finanzen & Recht",
        &[
            "Buchhaltung",
            "Steuerberatung (freiberuflich)",
            "Rechtsberatung (freiberuflich)",
            "Finanzberatung",
            "Versicherungsberatung",
            "Übersetzungen (juristisch/wirtschaftlich)",
            "Lektorat (juristisch/wirtschaftlich)",
        ],
    ),
    (
        "Gesundheit & Wellness",
        &[
            "Physiotherapie (selbstständig)",
            "Ergotherapie (selbstständig)",
            "Heilpraktiker",
            "Coaching (Gesundheit/Wellness)",
            "Yoga-Lehrer",
            "Pilates-Lehrer",
            "Massage-Therapeut",
            "Ernährungsberatung",
        ],
    ),
    (
        "Bildung & Nachhilfe",
        &[
            "Nachhilfelehrer (verschiedene Fächer)",
            "Sprachlehrer",
            "Dozenten (freiberuflich)",
            "Trainer (Soft Skills etc.)",
            "Musikunterricht",
            "Kunstunterricht",
        ],
    ),
    (
        "Kunst & Kultur",
        &[
            "Musiker (freiberuflich)",
            "Künstler (freiberuflich)",
            "Fotografen",
            "Videografen",
            "Texter (kreativ)",
            "Lektoren (Belletristik)",
            "Übersetzer (literarisch)",
            "Grafikdesigner (künstlerisch)",
        ],
    ),
    (
        "Veranstaltungen & Events",
        &[
            "Eventplanung",
            "Catering (klein)",
            "DJ (freiberuflich)",
            "Fotografen (Event)",
            "Videografen (Event)",
            "Servicekräfte (Mietbasis)",
        ],
    ),
    (
        "Tiere & Pflanzen",
        &[
            "Tierbetreuung (Hundesitter etc.)",
            "Gartenpflege",
            "Landschaftsgärtner (klein)",
            "Hundetrainer (freiberuflich)",
        ],
    ),
];

/// Category label → merchant category code. The payments processor
/// rejects other codes, so this table must not be reformatted.
const MCC_TABLE: &[(&str, &str)] = &[
    ("Handwerk", "1731"),
    ("Haushalt & Reinigung", "7349"),
    ("Transport & Logistik", "4215"),
    ("Hotel & Gastronomie", "5812"),
    ("IT & Technik", "7372"),
    ("Marketing & Vertrieb", "7311"),
    ("Finanzen & Recht", "8931"),
    ("Gesundheit & Wellness", "8099"),
    ("Bildung & Nachhilfe", "8299"),
    ("Kunst & Kultur", "8999"),
    ("Veranstaltungen & Events", "7999"),
    ("Tiere & Pflanzen", "0742"),
];

/// Category containing `subcategory`. The first match wins for
/// subcategories listed under several categories (`Umzugshelfer`).
pub fn find_category_by_subcategory(subcategory: &str) -> Option<&'static str> {
    let subcategory = subcategory.trim();
    if subcategory.is_empty() {
        return None;
    }
    CATEGORIES
        .iter()
        .find(|(_, subs)| subs.contains(&subcategory))
        .map(|(category, _)| *category)
}

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.iter().any(|(c, _)| *c == category)
}

/// Merchant category code for an industry label.
pub fn mcc_for_industry(industry: Option<&str>) -> &'static str {
    let Some(industry) = industry.map(str::trim).filter(|s| !s.is_empty()) else {
        return FALLBACK_MCC;
    };
    MCC_TABLE
        .iter()
        .find(|(label, _)| *label == industry)
        .map(|(_, code)| *code)
        .unwrap_or(FALLBACK_MCC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcc_fallbacks() {
        assert_eq!(mcc_for_industry(Some("")), "5999");
        assert_eq!(mcc_for_industry(None), "5999");
        assert_eq!(mcc_for_industry(Some("Raumfahrt")), "5999");
    }

    #[test]
    fn mcc_table_is_verbatim() {
        let expected = [
            ("Handwerk", "1731"),
            ("Haushalt & Reinigung", "7349"),
            ("Transport & Logistik", "4215"),
            ("Hotel & Gastronomie", "5812"),
            ("IT & Technik", "7372"),
            ("Marketing & Vertrieb", "7311"),
            ("Finanzen & Recht", "8931"),
            ("Gesundheit & Wellness", "8099"),
            ("Bildung & Nachhilfe", "8299"),
            ("Kunst & Kultur", "8999"),
            ("Veranstaltungen & Events", "7999"),
            ("Tiere & Pflanzen", "0742"),
        ];
        for (label, code) in expected {
            assert_eq!(mcc_for_industry(Some(label)), code, "{label}");
        }
    }

    #[test]
    fn every_category_has_an_mcc() {
        for (category, _) in CATEGORIES {
            assert_ne!(mcc_for_industry(Some(category)), FALLBACK_MCC, "{category}");
        }
    }

    #[test]
    fn subcategory_lookup() {
        assert_eq!(find_category_by_subcategory("Elektriker"), Some("Handwerk"));
        assert_eq!(find_category_by_subcategory("Mietkoch"), Some("Hotel & Gastronomie"));
        assert_eq!(
            find_category_by_subcategory("Umzugshelfer"),
            Some("Haushalt & Reinigung")
        );
        assert_eq!(find_category_by_subcategory("Astronaut"), None);
        assert_eq!(find_category_by_subcategory(""), None);
    }
}
