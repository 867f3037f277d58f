//! ISO 639-1 code to English language name mapping.
//!
//! ComicBookInfo stores languages by display name while every other format
//! (and [`GenericMetadata`](super::GenericMetadata)) uses the two-letter code.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Returns the ISO 639-1 code for an English language name, ignoring case.
///
/// # Examples
///
/// ```
/// use panels_metadata::models::lang;
/// assert_eq!(lang::name_to_iso("English"), Some("en"));
/// assert_eq!(lang::name_to_iso("japanese"), Some("ja"));
/// assert_eq!(lang::name_to_iso("Klingon"), None);
/// ```
pub fn name_to_iso(name: &str) -> Option<&'static str> {
    LANGUAGES_REVERSED.get(name.trim().to_lowercase().as_str()).copied()
}

/// Returns the English language name for an ISO 639-1 code, ignoring case.
///
/// # Examples
///
/// ```
/// use panels_metadata::models::lang;
/// assert_eq!(lang::iso_to_name("fr"), Some("French"));
/// assert_eq!(lang::iso_to_name("xx"), None);
/// ```
pub fn iso_to_name(iso: &str) -> Option<&'static str> {
    LANGUAGES.get(iso.trim().to_lowercase().as_str()).copied()
}

static LANGUAGES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("aa", "Afar"),
        ("ab", "Abkhazian"),
        ("af", "Afrikaans"),
        ("ak", "Akan"),
        ("am", "Amharic"),
        ("an", "Aragonese"),
        ("ar", "Arabic"),
        ("as", "Assamese"),
        ("av", "Avaric"),
        ("ay", "Aymara"),
        ("az", "Azerbaijani"),
        ("ba", "Bashkir"),
        ("be", "Belarusian"),
        ("bg", "Bulgarian"),
        ("bi", "Bislama"),
        ("bm", "Bambara"),
        ("bn", "Bengali"),
        ("bo", "Tibetan"),
        ("br", "Breton"),
        ("bs", "Bosnian"),
        ("ca", "Catalan"),
        ("ce", "Chechen"),
        ("ch", "Chamorro"),
        ("co", "Corsican"),
        ("cr", "Cree"),
        ("cs", "Czech"),
        ("cv", "Chuvash"),
        ("cy", "Welsh"),
        ("da", "Danish"),
        ("de", "German"),
        ("dv", "Dhivehi"),
        ("dz", "Dzongkha"),
        ("ee", "Ewe"),
        ("el", "Greek"),
        ("en", "English"),
        ("eo", "Esperanto"),
        ("es", "Spanish"),
        ("et", "Estonian"),
        ("eu", "Basque"),
        ("fa", "Persian"),
        ("ff", "Fulah"),
        ("fi", "Finnish"),
        ("fj", "Fijian"),
        ("fo", "Faroese"),
        ("fr", "French"),
        ("fy", "Western Frisian"),
        ("ga", "Irish"),
        ("gd", "Gaelic"),
        ("gl", "Galician"),
        ("gn", "Guarani"),
        ("gu", "Gujarati"),
        ("gv", "Manx"),
        ("ha", "Hausa"),
        ("he", "Hebrew"),
        ("hi", "Hindi"),
        ("hr", "Croatian"),
        ("ht", "Haitian"),
        ("hu", "Hungarian"),
        ("hy", "Armenian"),
        ("hz", "Herero"),
        ("ia", "Interlingua"),
        ("id", "Indonesian"),
        ("ie", "Interlingue"),
        ("ig", "Igbo"),
        ("ii", "Sichuan Yi"),
        ("ik", "Inupiaq"),
        ("io", "Ido"),
        ("is", "Icelandic"),
        ("it", "Italian"),
        ("iu", "Inuktitut"),
        ("ja", "Japanese"),
        ("jv", "Javanese"),
        ("ka", "Georgian"),
        ("kg", "Kongo"),
        ("ki", "Kikuyu"),
        ("kk", "Kazakh"),
        ("kl", "Kalaallisut"),
        ("km", "Central Khmer"),
        ("kn", "Kannada"),
        ("ko", "Korean"),
        ("kr", "Kanuri"),
        ("ks", "Kashmiri"),
        ("ku", "Kurdish"),
        ("kv", "Komi"),
        ("kw", "Cornish"),
        ("ky", "Kirghiz"),
        ("la", "Latin"),
        ("lb", "Luxembourgish"),
        ("lg", "Ganda"),
        ("li", "Limburgan"),
        ("ln", "Lingala"),
        ("lo", "Lao"),
        ("lt", "Lithuanian"),
        ("lu", "Luba-Katanga"),
        ("lv", "Latvian"),
        ("mg", "Malagasy"),
        ("mh", "Marshallese"),
        ("mi", "Maori"),
        ("mk", "Macedonian"),
        ("ml", "Malayalam"),
        ("mn", "Mongolian"),
        ("mr", "Marathi"),
        ("ms", "Malay"),
        ("mt", "Maltese"),
        ("my", "Burmese"),
        ("na", "Nauru"),
        ("nb", "Norwegian Bokmål"),
        ("nd", "North Ndebele"),
        ("ne", "Nepali"),
        ("ng", "Ndonga"),
        ("nl", "Dutch"),
        ("nn", "Norwegian Nynorsk"),
        ("no", "Norwegian"),
        ("nr", "South Ndebele"),
        ("nv", "Navajo"),
        ("ny", "Chichewa"),
        ("oc", "Occitan"),
        ("oj", "Ojibwa"),
        ("om", "Oromo"),
        ("or", "Oriya"),
        ("os", "Ossetian"),
        ("pa", "Punjabi"),
        ("pi", "Pali"),
        ("pl", "Polish"),
        ("ps", "Pashto"),
        ("pt", "Portuguese"),
        ("qu", "Quechua"),
        ("rm", "Romansh"),
        ("rn", "Rundi"),
        ("ro", "Romanian"),
        ("ru", "Russian"),
        ("rw", "Kinyarwanda"),
        ("sa", "Sanskrit"),
        ("sc", "Sardinian"),
        ("sd", "Sindhi"),
        ("se", "Northern Sami"),
        ("sg", "Sango"),
        ("si", "Sinhala"),
        ("sk", "Slovak"),
        ("sl", "Slovenian"),
        ("sm", "Samoan"),
        ("sn", "Shona"),
        ("so", "Somali"),
        ("sq", "Albanian"),
        ("sr", "Serbian"),
        ("ss", "Swati"),
        ("st", "Southern Sotho"),
        ("su", "Sundanese"),
        ("sv", "Swedish"),
        ("sw", "Swahili"),
        ("ta", "Tamil"),
        ("te", "Telugu"),
        ("tg", "Tajik"),
        ("th", "Thai"),
        ("ti", "Tigrinya"),
        ("tk", "Turkmen"),
        ("tl", "Tagalog"),
        ("tn", "Tswana"),
        ("to", "Tonga"),
        ("tr", "Turkish"),
        ("ts", "Tsonga"),
        ("tt", "Tatar"),
        ("tw", "Twi"),
        ("ty", "Tahitian"),
        ("ug", "Uighur"),
        ("uk", "Ukrainian"),
        ("ur", "Urdu"),
        ("uz", "Uzbek"),
        ("ve", "Venda"),
        ("vi", "Vietnamese"),
        ("wa", "Walloon"),
        ("wo", "Wolof"),
        ("xh", "Xhosa"),
        ("yi", "Yiddish"),
        ("yo", "Yoruba"),
        ("za", "Zhuang"),
        ("zh", "Chinese"),
        ("zu", "Zulu"),
    ])
});

/// Lowercased name to code, for case-insensitive reverse lookups.
static LANGUAGES_REVERSED: LazyLock<HashMap<String, &'static str>> =
    LazyLock::new(|| LANGUAGES.iter().map(|(iso, name)| (name.to_lowercase(), *iso)).collect());
