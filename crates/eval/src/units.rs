//! Unit-of-measure table for `CONVERT`.
//!
//! Each unit maps to the base unit of its quantity kind through
//! `base = (value + offset) * factor / divisor`. Only units of the same kind
//! convert into each other.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::types::EvalError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDef {
    pub symbol: String,
    pub label: String,
    /// Quantity kind, e.g. `length` or `energy`.
    pub kind: String,
    pub factor: Decimal,
    #[serde(default = "one")]
    pub divisor: Decimal,
    #[serde(default)]
    pub offset: Decimal,
}

fn one() -> Decimal {
    Decimal::ONE
}

#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    units: Vec<UnitDef>,
}

impl UnitTable {
    pub fn new(units: Vec<UnitDef>) -> Self {
        UnitTable { units }
    }

    /// The table shipped with the evaluator.
    pub fn builtin() -> &'static UnitTable {
        &BUILTIN
    }

    /// Load a table from a JSON array of unit definitions.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(UnitTable::new(serde_json::from_str(json)?))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look a unit up by exact symbol, then by case-insensitive label.
    /// A quantity kind restricts both searches.
    pub fn find(&self, unit: &str, kind: Option<&str>) -> Result<&UnitDef, EvalError> {
        let in_kind = |u: &&UnitDef| kind.map_or(true, |k| u.kind.eq_ignore_ascii_case(k));
        self.units
            .iter()
            .filter(in_kind)
            .find(|u| u.symbol == unit)
            .or_else(|| {
                self.units
                    .iter()
                    .filter(in_kind)
                    .find(|u| u.label.eq_ignore_ascii_case(unit))
            })
            .ok_or_else(|| EvalError::UnitNotRecognized {
                unit: unit.to_string(),
                quantity_kind: kind.unwrap_or_default().to_string(),
            })
    }

    pub fn convert(
        &self,
        value: Decimal,
        from: &str,
        to: &str,
        kind: Option<&str>,
    ) -> Result<Decimal, EvalError> {
        let source = self.find(from, kind)?;
        let target = self.find(to, kind)?;
        if !source.kind.eq_ignore_ascii_case(&target.kind) {
            return Err(EvalError::Inconvertible {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if source.symbol == target.symbol {
            return Ok(value);
        }
        let text = format!("{} {} -> {}", value, from, to);
        let base = numeric::div(
            numeric::mul(numeric::add(value, source.offset)?, source.factor)?,
            source.divisor,
            &text,
        )?;
        let scaled = numeric::div(numeric::mul(base, target.divisor)?, target.factor, &text)?;
        Ok(numeric::sub(scaled, target.offset)?.normalize())
    }
}

// ──────────────────────────────────────────────
// Built-in table
// ──────────────────────────────────────────────

fn unit(symbol: &str, label: &str, kind: &str, factor: Decimal, divisor: i64) -> UnitDef {
    UnitDef {
        symbol: symbol.to_string(),
        label: label.to_string(),
        kind: kind.to_string(),
        factor,
        divisor: Decimal::from(divisor),
        offset: Decimal::ZERO,
    }
}

fn d(n: i64) -> Decimal {
    Decimal::from(n)
}

static BUILTIN: Lazy<UnitTable> = Lazy::new(|| {
    let mut units = vec![
        // length, base metre
        unit("m", "meter", "length", d(1), 1),
        unit("m", "metre", "length", d(1), 1),
        unit("cm", "centimeter", "length", d(1), 100),
        unit("cm", "centimetre", "length", d(1), 100),
        unit("mm", "millimeter", "length", d(1), 1000),
        unit("mm", "millimetre", "length", d(1), 1000),
        unit("km", "kilometer", "length", d(1000), 1),
        unit("km", "kilometre", "length", d(1000), 1),
        unit("in", "inch", "length", Decimal::new(254, 4), 1),
        unit("ft", "foot", "length", Decimal::new(3048, 4), 1),
        unit("yd", "yard", "length", Decimal::new(9144, 4), 1),
        unit("mi", "mile", "length", Decimal::new(1609344, 3), 1),
        // mass, base kilogram
        unit("kg", "kilogram", "mass", d(1), 1),
        unit("g", "gram", "mass", d(1), 1000),
        unit("mg", "milligram", "mass", d(1), 1_000_000),
        unit("t", "tonne", "mass", d(1000), 1),
        unit("lb", "pound", "mass", Decimal::new(45359237, 8), 1),
        unit("oz", "ounce", "mass", Decimal::new(28349523125, 12), 1),
        unit("ton", "short ton", "mass", Decimal::new(90718474, 5), 1),
        // volume, base cubic metre
        unit("m3", "cubic meter", "volume", d(1), 1),
        unit("L", "liter", "volume", d(1), 1000),
        unit("L", "litre", "volume", d(1), 1000),
        unit("mL", "milliliter", "volume", d(1), 1_000_000),
        unit("gal", "gallon", "volume", Decimal::new(3785411784, 12), 1),
        unit("ft3", "cubic foot", "volume", Decimal::new(28316846592, 12), 1),
        // area, base square metre
        unit("m2", "square meter", "area", d(1), 1),
        unit("km2", "square kilometer", "area", d(1_000_000), 1),
        unit("ha", "hectare", "area", d(10_000), 1),
        unit("ft2", "square foot", "area", Decimal::new(9290304, 8), 1),
        unit("ac", "acre", "area", Decimal::new(40468564224, 7), 1),
        // energy, base joule
        unit("J", "joule", "energy", d(1), 1),
        unit("kJ", "kilojoule", "energy", d(1000), 1),
        unit("MJ", "megajoule", "energy", d(1_000_000), 1),
        unit("GJ", "gigajoule", "energy", d(1_000_000_000), 1),
        unit("Wh", "watt hour", "energy", d(3600), 1),
        unit("kWh", "kilowatt hour", "energy", d(3_600_000), 1),
        unit("MWh", "megawatt hour", "energy", d(3_600_000_000), 1),
        unit("BTU", "british thermal unit", "energy", Decimal::new(105505585262, 8), 1),
        unit("thm", "therm", "energy", Decimal::new(105505585262, 3), 1),
        // power, base watt
        unit("W", "watt", "power", d(1), 1),
        unit("kW", "kilowatt", "power", d(1000), 1),
        unit("MW", "megawatt", "power", d(1_000_000), 1),
        unit("hp", "horsepower", "power", Decimal::new(74569987158227022, 14), 1),
        // time, base second
        unit("s", "second", "time", d(1), 1),
        unit("min", "minute", "time", d(60), 1),
        unit("h", "hour", "time", d(3600), 1),
        unit("d", "day", "time", d(86_400), 1),
        // temperature, base kelvin
        unit("K", "kelvin", "temperature", d(1), 1),
    ];
    units.push(UnitDef {
        offset: Decimal::new(27315, 2),
        ..unit("°C", "celsius", "temperature", d(1), 1)
    });
    units.push(UnitDef {
        offset: Decimal::new(45967, 2),
        ..unit("°F", "fahrenheit", "temperature", d(5), 9)
    });
    UnitTable::new(units)
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn convert(v: &str, from: &str, to: &str, kind: Option<&str>) -> Result<Decimal, EvalError> {
        UnitTable::builtin().convert(dec(v), from, to, kind)
    }

    #[test]
    fn labels_and_symbols() {
        assert_eq!(convert("1", "meter", "centimeter", None).unwrap(), dec("100"));
        assert_eq!(convert("1", "millimetre", "centimeter", None).unwrap(), dec("0.1"));
        assert_eq!(convert("1", "m", "cm", Some("length")).unwrap(), dec("100"));
        assert_eq!(convert("2.5", "KILOMETER", "m", None).unwrap(), dec("2500"));
    }

    #[test]
    fn energy() {
        assert_eq!(convert("1", "kWh", "MJ", None).unwrap(), dec("3.6"));
    }

    #[test]
    fn temperature_offsets() {
        assert_eq!(convert("100", "celsius", "fahrenheit", None).unwrap(), dec("212"));
        assert_eq!(convert("32", "°F", "°C", None).unwrap(), dec("0"));
        assert_eq!(convert("0", "°C", "K", None).unwrap(), dec("273.15"));
    }

    #[test]
    fn kind_filters_lookup() {
        let err = convert("1", "m", "cm", Some("mass")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unit 'm' ('mass' quantity kind) not recognized."
        );
    }

    #[test]
    fn different_kinds_do_not_convert() {
        let err = convert("1", "kg", "m", None).unwrap_err();
        assert!(matches!(err, EvalError::Inconvertible { .. }));
    }

    #[test]
    fn unknown_unit() {
        assert!(matches!(
            convert("1", "furlong", "m", None),
            Err(EvalError::UnitNotRecognized { .. })
        ));
    }

    #[test]
    fn custom_table_from_json() {
        let table = UnitTable::from_json(
            r#"[
                {"symbol": "tCO2e", "label": "tonne co2e", "kind": "emissions", "factor": "1000"},
                {"symbol": "kgCO2e", "label": "kilogram co2e", "kind": "emissions", "factor": "1"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.convert(dec("1.5"), "tCO2e", "kgCO2e", None).unwrap(),
            dec("1500")
        );
    }
}
