//! Display names for ISO 639-3 language codes.
//!
//! LIDIA payloads carry the subject language as a three-letter code. The
//! table covers the languages that show up in linguistics literature; any
//! other code is stored without a name.

/// Look up the English name for a language code. Case-insensitive.
pub fn language_name(code: &str) -> Option<&'static str> {
    let code = code.trim().to_ascii_lowercase();
    let name = match code.as_str() {
        "afr" => "Afrikaans",
        "amh" => "Amharic",
        "ara" => "Arabic",
        "arb" => "Standard Arabic",
        "aze" => "Azerbaijani",
        "bel" => "Belarusian",
        "ben" => "Bengali",
        "bre" => "Breton",
        "bul" => "Bulgarian",
        "cat" => "Catalan",
        "ces" => "Czech",
        "cmn" => "Mandarin Chinese",
        "cym" => "Welsh",
        "dan" => "Danish",
        "deu" => "German",
        "ell" => "Modern Greek",
        "eng" => "English",
        "est" => "Estonian",
        "eus" => "Basque",
        "fao" => "Faroese",
        "fas" => "Persian",
        "fin" => "Finnish",
        "fra" => "French",
        "fry" => "Western Frisian",
        "gla" => "Scottish Gaelic",
        "gle" => "Irish",
        "glg" => "Galician",
        "grc" => "Ancient Greek",
        "gsw" => "Swiss German",
        "hau" => "Hausa",
        "heb" => "Hebrew",
        "hin" => "Hindi",
        "hrv" => "Croatian",
        "hun" => "Hungarian",
        "hye" => "Armenian",
        "ind" => "Indonesian",
        "isl" => "Icelandic",
        "ita" => "Italian",
        "jpn" => "Japanese",
        "kat" => "Georgian",
        "kaz" => "Kazakh",
        "khm" => "Khmer",
        "kor" => "Korean",
        "lat" => "Latin",
        "lav" => "Latvian",
        "lim" => "Limburgish",
        "lit" => "Lithuanian",
        "ltz" => "Luxembourgish",
        "mal" => "Malayalam",
        "mar" => "Marathi",
        "mkd" => "Macedonian",
        "mlt" => "Maltese",
        "mon" => "Mongolian",
        "msa" => "Malay",
        "nld" => "Dutch",
        "nno" => "Norwegian Nynorsk",
        "nob" => "Norwegian Bokmål",
        "nor" => "Norwegian",
        "pan" => "Punjabi",
        "pol" => "Polish",
        "por" => "Portuguese",
        "que" => "Quechua",
        "ron" => "Romanian",
        "rus" => "Russian",
        "san" => "Sanskrit",
        "slk" => "Slovak",
        "slv" => "Slovenian",
        "som" => "Somali",
        "spa" => "Spanish",
        "sqi" => "Albanian",
        "srp" => "Serbian",
        "swa" => "Swahili",
        "swe" => "Swedish",
        "tam" => "Tamil",
        "tel" => "Telugu",
        "tgl" => "Tagalog",
        "tha" => "Thai",
        "tur" => "Turkish",
        "ukr" => "Ukrainian",
        "urd" => "Urdu",
        "uzb" => "Uzbek",
        "vie" => "Vietnamese",
        "vls" => "Vlaams",
        "wol" => "Wolof",
        "yid" => "Yiddish",
        "yor" => "Yoruba",
        "yue" => "Yue Chinese",
        "zho" => "Chinese",
        "zul" => "Zulu",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(language_name("nld"), Some("Dutch"));
        assert_eq!(language_name("ENG"), Some("English"));
    }

    #[test]
    fn test_unknown_codes_have_no_name() {
        assert_eq!(language_name("unspecified"), None);
        assert_eq!(language_name(""), None);
        assert_eq!(language_name("xx"), None);
    }
}
