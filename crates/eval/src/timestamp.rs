//! `AS_TIMESTAMP` parsing.
//!
//! Date patterns use the familiar `yyyy-MM-dd HH:mm:ss` letter syntax and
//! are translated into chrono format strings. A pattern with time fields
//! parses a date-time, otherwise a date at midnight. Offsets in the value
//! (`X`, `x`, `Z`) are honoured unless an explicit timezone is supplied;
//! zone names (`z`) must be the last field of the pattern. Month and
//! weekday names are read in the language of the `locale` tag.

use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone,
};
use chrono_tz::Tz;

use crate::types::EvalError;

/// Calendar unit a timestamp can be truncated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundDownTo {
    Day,
    /// Weeks start on Sunday.
    Week,
    Month,
    Quarter,
    Year,
}

impl FromStr for RoundDownTo {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(RoundDownTo::Day),
            "week" => Ok(RoundDownTo::Week),
            "month" => Ok(RoundDownTo::Month),
            "quarter" => Ok(RoundDownTo::Quarter),
            "year" => Ok(RoundDownTo::Year),
            other => Err(EvalError::invalid_arguments(format!(
                "Unsupported roundDownTo value '{}', expected one of day, week, month, quarter, year.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimestampOptions {
    /// Explicit zone; overrides any offset or zone name in the value.
    pub timezone: Option<Tz>,
    /// Zone used when neither the value nor the call names one.
    pub default_timezone: Tz,
    pub round_down: Option<RoundDownTo>,
    pub language: Language,
}

/// Parse a timezone name such as `America/Denver` or `UTC`.
pub fn parse_timezone(name: &str) -> Result<Tz, EvalError> {
    Tz::from_str(name.trim())
        .map_err(|_| EvalError::invalid_arguments(format!("Unknown timezone '{}'.", name)))
}

/// Parse `value` against `pattern`, returning whole seconds since epoch
/// multiplied by 1000.
pub fn parse_timestamp(
    value: &str,
    pattern: &str,
    opts: &TimestampOptions,
) -> Result<i64, EvalError> {
    let translated = translate(pattern)?;
    if translated.names && opts.language == Language::Unnamed {
        return Err(EvalError::invalid_arguments(format!(
            "Pattern '{}' reads month or day names, which are not available for the requested locale.",
            pattern
        )));
    }
    let invalid = |e: chrono::ParseError| {
        EvalError::invalid_arguments(format!(
            "Unable to parse '{}' with pattern '{}': {}.",
            value, pattern, e
        ))
    };

    let mut text = if translated.names {
        english_names(value.trim(), opts.language)?
    } else {
        value.trim().to_string()
    };
    let mut zone_name = None;
    if translated.zone_name {
        let split = text.rfind(char::is_whitespace).ok_or_else(|| {
            EvalError::invalid_arguments(format!(
                "Unable to parse '{}' with pattern '{}': missing zone name.",
                value, pattern
            ))
        })?;
        zone_name = Some(text[split..].trim().to_string());
        text.truncate(split);
    }
    if translated.offset && text.ends_with('Z') {
        text.pop();
        text.push_str("+00:00");
    }

    let parsed: DateTime<FixedOffset> = if translated.offset && opts.timezone.is_none() {
        if translated.time {
            DateTime::parse_from_str(&text, &translated.format).map_err(invalid)?
        } else {
            return Err(EvalError::invalid_arguments(format!(
                "Pattern '{}' carries an offset but no time of day.",
                pattern
            )));
        }
    } else {
        let naive = if translated.time {
            NaiveDateTime::parse_from_str(&text, &translated.format).map_err(invalid)?
        } else {
            NaiveDate::parse_from_str(&text, &translated.format)
                .map_err(invalid)?
                .and_time(NaiveTime::MIN)
        };
        match (opts.timezone, zone_name) {
            (Some(tz), _) => localize(&tz, &naive)?,
            (None, Some(name)) => match zone_abbreviation(&name) {
                Some(offset) => localize(&offset, &naive)?,
                None => localize(&parse_timezone(&name)?, &naive)?,
            },
            (None, None) => localize(&opts.default_timezone, &naive)?,
        }
    };

    let instant = match opts.round_down {
        Some(unit) => round_down(&parsed, unit)?,
        None => parsed,
    };
    Ok(instant.timestamp() * 1000)
}

fn localize<T: TimeZone>(tz: &T, naive: &NaiveDateTime) -> Result<DateTime<FixedOffset>, EvalError> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&dt.offset().fix()))
        .ok_or_else(|| {
            EvalError::invalid_arguments(format!(
                "Local time {} does not exist in the requested timezone.",
                naive
            ))
        })
}

/// Truncate in the value's own offset.
fn round_down(
    dt: &DateTime<FixedOffset>,
    unit: RoundDownTo,
) -> Result<DateTime<FixedOffset>, EvalError> {
    let date = dt.date_naive();
    let start = match unit {
        RoundDownTo::Day => Some(date),
        RoundDownTo::Week => {
            Some(date - Duration::days(i64::from(date.weekday().num_days_from_sunday())))
        }
        RoundDownTo::Month => date.with_day(1),
        RoundDownTo::Quarter => NaiveDate::from_ymd_opt(date.year(), (date.month0() / 3) * 3 + 1, 1),
        RoundDownTo::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    };
    let start = start.ok_or_else(|| EvalError::invalid_arguments("Unable to round down date."))?;
    localize(dt.offset(), &start.and_time(NaiveTime::MIN))
}

fn zone_abbreviation(name: &str) -> Option<FixedOffset> {
    let hours = match name.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

// ──────────────────────────────────────────────
// Pattern translation
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Translated {
    format: String,
    /// Has hour, minute, second or fraction fields.
    time: bool,
    /// Has a numeric offset field.
    offset: bool,
    /// Ends with a zone name field (stripped from the format).
    zone_name: bool,
    /// Reads month names, weekday names or an AM/PM marker.
    names: bool,
}

fn translate(pattern: &str) -> Result<Translated, EvalError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = Translated {
        format: String::new(),
        time: false,
        offset: false,
        zone_name: false,
        names: false,
    };
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        // Quoted literal; '' is an escaped quote
        if c == '\'' {
            if chars.get(pos + 1) == Some(&'\'') {
                out.format.push('\'');
                pos += 2;
                continue;
            }
            pos += 1;
            while pos < chars.len() {
                if chars[pos] == '\'' {
                    if chars.get(pos + 1) == Some(&'\'') {
                        out.format.push('\'');
                        pos += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out.format, chars[pos]);
                pos += 1;
            }
            pos += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out.format, c);
            pos += 1;
            continue;
        }

        let start = pos;
        while pos < chars.len() && chars[pos] == c {
            pos += 1;
        }
        let count = pos - start;

        if out.zone_name {
            return Err(EvalError::invalid_arguments(format!(
                "Zone name must be the last field of pattern '{}'.",
                pattern
            )));
        }

        let spec = match c {
            'y' | 'u' if count == 2 => "%y",
            'y' | 'u' => "%Y",
            'M' | 'L' if count <= 2 => "%m",
            'M' | 'L' if count == 3 => "%b",
            'M' | 'L' => "%B",
            'd' => "%d",
            'D' => "%j",
            'E' if count <= 3 => "%a",
            'E' => "%A",
            'a' => "%p",
            'H' | 'k' => "%H",
            'h' | 'K' => "%I",
            'm' => "%M",
            's' => "%S",
            'S' => {
                // A literal '.' before the fraction is consumed by %.f
                if out.format.ends_with('.') {
                    out.format.pop();
                    "%.f"
                } else {
                    match count {
                        3 => "%3f",
                        6 => "%6f",
                        9 => "%9f",
                        _ => "%f",
                    }
                }
            }
            'X' | 'x' | 'Z' => {
                out.offset = true;
                "%#z"
            }
            'z' | 'V' => {
                out.zone_name = true;
                ""
            }
            other => {
                return Err(EvalError::invalid_arguments(format!(
                    "Unsupported pattern letter '{}' in '{}'.",
                    other, pattern
                )))
            }
        };
        if matches!(c, 'H' | 'k' | 'h' | 'K' | 'm' | 's' | 'S') {
            out.time = true;
        }
        if matches!(c, 'E' | 'a') || (matches!(c, 'M' | 'L') && count >= 3) {
            out.names = true;
        }
        out.format.push_str(spec);
    }

    if out.zone_name {
        let trimmed = out.format.trim_end().len();
        out.format.truncate(trimmed);
    }
    Ok(out)
}

fn push_literal(format: &mut String, c: char) {
    if c == '%' {
        format.push_str("%%");
    } else {
        format.push(c);
    }
}

// ──────────────────────────────────────────────
// Locales
// ──────────────────────────────────────────────

/// Language of the month and weekday names in a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
    /// A well-formed tag in a language without name tables; only numeric
    /// patterns can be read.
    Unnamed,
}

/// Parse a locale tag such as `en-US`, `fr` or `pt_BR`.
pub fn parse_locale(tag: &str) -> Result<Language, EvalError> {
    let invalid = || EvalError::invalid_arguments(format!("Invalid locale '{}'.", tag));
    let mut subtags = tag.trim().split(['-', '_']);
    let language = subtags.next().unwrap_or_default();
    if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    for sub in subtags {
        if sub.is_empty() || sub.len() > 8 || !sub.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
    }
    Ok(match language.to_ascii_lowercase().as_str() {
        "en" => Language::English,
        "fr" => Language::French,
        "de" => Language::German,
        "es" => Language::Spanish,
        "it" => Language::Italian,
        "pt" => Language::Portuguese,
        "nl" => Language::Dutch,
        _ => Language::Unnamed,
    })
}

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Sunday first.
const DAYS_EN: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Spellings per month (full name first, then abbreviations without their
/// trailing dot) and per weekday, Sunday first.
type NameTable = (&'static [&'static [&'static str]; 12], &'static [&'static [&'static str]; 7]);

const FRENCH: NameTable = (
    &[
        &["janvier", "janv"], &["février", "févr"], &["mars"], &["avril", "avr"],
        &["mai"], &["juin"], &["juillet", "juil"], &["août"], &["septembre", "sept"],
        &["octobre", "oct"], &["novembre", "nov"], &["décembre", "déc"],
    ],
    &[
        &["dimanche", "dim"], &["lundi", "lun"], &["mardi", "mar"], &["mercredi", "mer"],
        &["jeudi", "jeu"], &["vendredi", "ven"], &["samedi", "sam"],
    ],
);

const GERMAN: NameTable = (
    &[
        &["januar", "jan"], &["februar", "feb"], &["märz", "mär"], &["april", "apr"],
        &["mai"], &["juni", "jun"], &["juli", "jul"], &["august", "aug"],
        &["september", "sept", "sep"], &["oktober", "okt"], &["november", "nov"],
        &["dezember", "dez"],
    ],
    &[
        &["sonntag", "so"], &["montag", "mo"], &["dienstag", "di"], &["mittwoch", "mi"],
        &["donnerstag", "do"], &["freitag", "fr"], &["samstag", "sa"],
    ],
);

const SPANISH: NameTable = (
    &[
        &["enero", "ene"], &["febrero", "feb"], &["marzo", "mar"], &["abril", "abr"],
        &["mayo", "may"], &["junio", "jun"], &["julio", "jul"], &["agosto", "ago"],
        &["septiembre", "sept", "sep"], &["octubre", "oct"], &["noviembre", "nov"],
        &["diciembre", "dic"],
    ],
    &[
        &["domingo", "dom"], &["lunes", "lun"], &["martes", "mar"], &["miércoles", "mié"],
        &["jueves", "jue"], &["viernes", "vie"], &["sábado", "sáb"],
    ],
);

const ITALIAN: NameTable = (
    &[
        &["gennaio", "gen"], &["febbraio", "feb"], &["marzo", "mar"], &["aprile", "apr"],
        &["maggio", "mag"], &["giugno", "giu"], &["luglio", "lug"], &["agosto", "ago"],
        &["settembre", "set"], &["ottobre", "ott"], &["novembre", "nov"],
        &["dicembre", "dic"],
    ],
    &[
        &["domenica", "dom"], &["lunedì", "lun"], &["martedì", "mar"], &["mercoledì", "mer"],
        &["giovedì", "gio"], &["venerdì", "ven"], &["sabato", "sab"],
    ],
);

const PORTUGUESE: NameTable = (
    &[
        &["janeiro", "jan"], &["fevereiro", "fev"], &["março", "mar"], &["abril", "abr"],
        &["maio", "mai"], &["junho", "jun"], &["julho", "jul"], &["agosto", "ago"],
        &["setembro", "set"], &["outubro", "out"], &["novembro", "nov"],
        &["dezembro", "dez"],
    ],
    &[
        &["domingo", "dom"], &["segunda-feira", "seg"], &["terça-feira", "ter"],
        &["quarta-feira", "qua"], &["quinta-feira", "qui"], &["sexta-feira", "sex"],
        &["sábado", "sáb"],
    ],
);

const DUTCH: NameTable = (
    &[
        &["januari", "jan"], &["februari", "feb"], &["maart", "mrt"], &["april", "apr"],
        &["mei"], &["juni", "jun"], &["juli", "jul"], &["augustus", "aug"],
        &["september", "sep"], &["oktober", "okt"], &["november", "nov"],
        &["december", "dec"],
    ],
    &[
        &["zondag", "zo"], &["maandag", "ma"], &["dinsdag", "di"], &["woensdag", "wo"],
        &["donderdag", "do"], &["vrijdag", "vr"], &["zaterdag", "za"],
    ],
);

fn name_table(language: Language) -> Option<NameTable> {
    match language {
        Language::French => Some(FRENCH),
        Language::German => Some(GERMAN),
        Language::Spanish => Some(SPANISH),
        Language::Italian => Some(ITALIAN),
        Language::Portuguese => Some(PORTUGUESE),
        Language::Dutch => Some(DUTCH),
        Language::English | Language::Unnamed => None,
    }
}

/// English name for a localized spelling, and whether the spelling is an
/// abbreviation.
fn lookup_name(word: &str, (months, days): NameTable) -> Option<(&'static str, bool)> {
    let find = |names: &[&[&str]]| {
        names.iter().enumerate().find_map(|(i, spellings)| {
            spellings
                .iter()
                .position(|s| *s == word)
                .map(|pos| (i, pos > 0))
        })
    };
    if let Some((i, abbreviated)) = find(&months[..]) {
        return Some((MONTHS_EN[i], abbreviated));
    }
    find(&days[..]).map(|(i, abbreviated)| (DAYS_EN[i], abbreviated))
}

/// Whether `word` (lower case) spells an English month or weekday, in full
/// or as its three-letter abbreviation.
fn is_english_name(word: &str) -> bool {
    MONTHS_EN.iter().chain(DAYS_EN.iter()).any(|name| {
        let name = name.to_lowercase();
        word == name || (word.chars().count() == 3 && name.starts_with(word))
    })
}

/// Rewrite localized month and weekday names in `value` as English names.
/// The dot closing an abbreviation is dropped with it. English names that
/// are not also spellings of the locale are rejected.
fn english_names(value: &str, language: Language) -> Result<String, EvalError> {
    let Some(table) = name_table(language) else {
        return Ok(value.to_string());
    };
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut pos = 0;
    while pos < chars.len() {
        if !chars[pos].is_alphabetic() {
            out.push(chars[pos]);
            pos += 1;
            continue;
        }
        let start = pos;
        while pos < chars.len()
            && (chars[pos].is_alphabetic()
                || (chars[pos] == '-' && chars.get(pos + 1).is_some_and(|c| c.is_alphabetic())))
        {
            pos += 1;
        }
        let word: String = chars[start..pos].iter().collect();
        let lower = word.to_lowercase();
        match lookup_name(&lower, table) {
            Some((english, abbreviated)) => {
                out.push_str(english);
                if abbreviated && chars.get(pos) == Some(&'.') {
                    pos += 1;
                }
            }
            None if is_english_name(&lower) => {
                return Err(EvalError::invalid_arguments(format!(
                    "'{}' is not a month or day name in the requested locale.",
                    word
                )));
            }
            None => out.push_str(&word),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denver() -> Tz {
        parse_timezone("America/Denver").unwrap()
    }

    fn opts(timezone: Option<Tz>, round_down: Option<RoundDownTo>) -> TimestampOptions {
        TimestampOptions {
            timezone,
            default_timezone: Tz::UTC,
            round_down,
            language: Language::English,
        }
    }

    fn in_language(language: Language) -> TimestampOptions {
        TimestampOptions {
            language,
            ..opts(None, None)
        }
    }

    #[test]
    fn translation() {
        let t = translate("yyyy-MM-dd'T'HH:mm:ss.SSSXXX").unwrap();
        assert_eq!(t.format, "%Y-%m-%dT%H:%M:%S%.f%#z");
        assert!(t.time && t.offset && !t.zone_name);

        let t = translate("M/d/yy").unwrap();
        assert_eq!(t.format, "%m/%d/%y");
        assert!(!t.time);

        let t = translate("M/d/yy HH:mm:ss zzz").unwrap();
        assert_eq!(t.format, "%m/%d/%y %H:%M:%S");
        assert!(t.zone_name);

        assert_eq!(translate("'it''s' yyyy").unwrap().format, "it's %Y");
        assert_eq!(translate("dd MMM yyyy").unwrap().format, "%d %b %Y");
    }

    #[test]
    fn unsupported_letter() {
        assert!(translate("yyyy-QQ").is_err());
        assert!(translate("HH z mm").is_err());
    }

    #[test]
    fn date_only_in_zone() {
        let ms = parse_timestamp("1/21/22", "M/d/yy", &opts(Some(denver()), None)).unwrap();
        assert_eq!(ms, 1642748400000);
    }

    #[test]
    fn date_time_in_utc() {
        let ms = parse_timestamp(
            "1/21/22 13:40:13",
            "M/d/yy HH:mm:ss",
            &opts(Some(Tz::UTC), None),
        )
        .unwrap();
        assert_eq!(ms, 1642772413000);
    }

    #[test]
    fn literal_t_separator() {
        let ms = parse_timestamp(
            "2022-03-12T13:12:11",
            "yyyy-MM-dd'T'HH:mm:ss",
            &opts(Some(denver()), None),
        )
        .unwrap();
        assert_eq!(ms, 1647115931000);
    }

    #[test]
    fn offset_in_value_drops_milliseconds() {
        let pattern = "yyyy-MM-dd'T'HH:mm:ss.SSSXXX";
        let o = opts(None, None);
        assert_eq!(
            parse_timestamp("2022-07-25T18:23:54.097+05:30", pattern, &o).unwrap(),
            1658753634000
        );
        assert_eq!(
            parse_timestamp("2022-07-25T12:53:54.097Z", pattern, &o).unwrap(),
            1658753634000
        );
    }

    #[test]
    fn zone_name_in_value() {
        let pattern = "M/d/yy HH:mm:ss zzz";
        let ms = parse_timestamp("1/21/22 13:40:13 PST", pattern, &opts(None, None)).unwrap();
        assert_eq!(ms, 1642801213000);
        // An explicit timezone wins over the parsed zone name
        let ms = parse_timestamp("1/21/22 13:40:13 PST", pattern, &opts(Some(denver()), None))
            .unwrap();
        assert_eq!(ms, 1642797613000);
    }

    #[test]
    fn default_zone_applies() {
        let ms = parse_timestamp("2022-01-01", "yyyy-MM-dd", &opts(None, None)).unwrap();
        assert_eq!(ms, 1640995200000);
    }

    #[test]
    fn round_down_units() {
        let tz = Some(denver());
        let month = parse_timestamp("2/21/22", "M/d/yy", &opts(tz, Some(RoundDownTo::Month)));
        assert_eq!(month.unwrap(), 1643698800000);
        let year = parse_timestamp("2/21/22", "M/d/yy", &opts(tz, Some(RoundDownTo::Year)));
        assert_eq!(year.unwrap(), 1641020400000);
        let q3 = parse_timestamp("8/21/22", "M/d/yy", &opts(tz, Some(RoundDownTo::Quarter)));
        assert_eq!(q3.unwrap(), 1656655200000);
        // Truncation keeps the value's offset (MST) across the DST boundary
        let q4 = parse_timestamp("11/21/22", "M/d/yy", &opts(tz, Some(RoundDownTo::Quarter)));
        assert_eq!(q4.unwrap(), 1664607600000);
        // 2022-01-21 is a Friday; the week starts Sunday 2022-01-16
        let week = parse_timestamp("1/21/22", "M/d/yy", &opts(tz, Some(RoundDownTo::Week)));
        assert_eq!(week.unwrap(), 1642316400000);
        let day = parse_timestamp(
            "1/21/22 13:40:13",
            "M/d/yy HH:mm:ss",
            &opts(tz, Some(RoundDownTo::Day)),
        );
        assert_eq!(day.unwrap(), 1642748400000);
    }

    #[test]
    fn locale_tags() {
        assert_eq!(parse_locale("en-US").unwrap(), Language::English);
        assert_eq!(parse_locale("fr").unwrap(), Language::French);
        assert_eq!(parse_locale("pt_BR").unwrap(), Language::Portuguese);
        assert_eq!(parse_locale("ja-JP").unwrap(), Language::Unnamed);
        assert!(parse_locale("").is_err());
        assert!(parse_locale("english").is_err());
        assert!(parse_locale("fr--FR").is_err());
    }

    #[test]
    fn localized_month_names() {
        let fr = in_language(Language::French);
        assert_eq!(
            parse_timestamp("21 janv. 2022", "d MMM yyyy", &fr).unwrap(),
            1642723200000
        );
        assert_eq!(
            parse_timestamp("vendredi 21 janvier 2022", "EEEE d MMMM yyyy", &fr).unwrap(),
            1642723200000
        );
        let de = in_language(Language::German);
        assert_eq!(parse_timestamp("21. März 2022", "d. MMMM yyyy", &de).unwrap(), 1647820800000);
        let pt = in_language(Language::Portuguese);
        assert_eq!(
            parse_timestamp("segunda-feira, 3 de janeiro de 2022", "EEEE, d 'de' MMMM 'de' yyyy", &pt)
                .unwrap(),
            1641168000000
        );
    }

    #[test]
    fn english_names_are_not_read_in_other_languages() {
        let fr = in_language(Language::French);
        assert!(parse_timestamp("21 January 2022", "d MMMM yyyy", &fr).is_err());
        assert!(parse_timestamp("21 Jan 2022", "d MMM yyyy", &fr).is_err());
        let de = in_language(Language::German);
        assert_eq!(parse_timestamp("1 April 2022", "d MMMM yyyy", &de).unwrap(), 1648771200000);
    }

    #[test]
    fn unnamed_locale_reads_numeric_patterns_only() {
        let ja = in_language(Language::Unnamed);
        assert_eq!(parse_timestamp("2022-01-01", "yyyy-MM-dd", &ja).unwrap(), 1640995200000);
        let err = parse_timestamp("21 Jan 2022", "d MMM yyyy", &ja).unwrap_err();
        assert!(matches!(err, EvalError::InvalidArguments { .. }));
    }

    #[test]
    fn round_down_parse() {
        assert_eq!("Quarter".parse::<RoundDownTo>().unwrap(), RoundDownTo::Quarter);
        assert!("fortnight".parse::<RoundDownTo>().is_err());
    }

    #[test]
    fn bad_input() {
        assert!(parse_timestamp("not a date", "M/d/yy", &opts(None, None)).is_err());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
