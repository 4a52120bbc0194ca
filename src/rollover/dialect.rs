//! The locale-specific vocabulary used when rendering formulas as text.

use serde::Serialize;

/// Function names and separators that a spreadsheet expects in formulas for a given locale.
///
/// Locales that use a comma as their decimal mark also use `;` to separate function arguments.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
pub struct LocaleDialect {
    pub if_fn: &'static str,
    pub and_fn: &'static str,
    pub sum_fn: &'static str,
    pub arg_separator: char,
    pub decimal_separator: char,
}

impl LocaleDialect {
    pub const ENGLISH: LocaleDialect = LocaleDialect {
        if_fn: "IF",
        and_fn: "AND",
        sum_fn: "SUM",
        arg_separator: ',',
        decimal_separator: '.',
    };

    pub const SPANISH: LocaleDialect = LocaleDialect {
        if_fn: "SI",
        and_fn: "Y",
        sum_fn: "SUMA",
        arg_separator: ';',
        decimal_separator: ',',
    };

    pub const PORTUGUESE: LocaleDialect = LocaleDialect {
        if_fn: "SE",
        and_fn: "E",
        sum_fn: "SOMA",
        arg_separator: ';',
        decimal_separator: ',',
    };

    pub const GERMAN: LocaleDialect = LocaleDialect {
        if_fn: "WENN",
        and_fn: "UND",
        sum_fn: "SUMME",
        arg_separator: ';',
        decimal_separator: ',',
    };

    pub const FRENCH: LocaleDialect = LocaleDialect {
        if_fn: "SI",
        and_fn: "ET",
        sum_fn: "SOMME",
        arg_separator: ';',
        decimal_separator: ',',
    };

    pub const ITALIAN: LocaleDialect = LocaleDialect {
        if_fn: "SE",
        and_fn: "E",
        sum_fn: "SOMMA",
        arg_separator: ';',
        decimal_separator: ',',
    };
}

impl Default for LocaleDialect {
    fn default() -> Self {
        LocaleDialect::ENGLISH
    }
}

/// Chooses the dialect for a locale tag such as `es_CO`, `es-419`, `en_US` or `pt_BR`. Only the
/// language prefix matters. Unknown or empty tags get the English dialect.
pub fn dialect_for(locale_tag: &str) -> LocaleDialect {
    let language = locale_tag
        .trim()
        .split(['_', '-'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match language.as_str() {
        "es" => LocaleDialect::SPANISH,
        "pt" => LocaleDialect::PORTUGUESE,
        "de" => LocaleDialect::GERMAN,
        "fr" => LocaleDialect::FRENCH,
        "it" => LocaleDialect::ITALIAN,
        _ => LocaleDialect::ENGLISH,
    }
}
