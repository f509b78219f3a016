//! Process-wide settings.
//!
//! One mutable record owned by the runtime, with defined defaults and a
//! textual serialization: a script of assignment commands that restores the
//! state when re-executed. State save temporarily installs a neutral
//! configuration so numbers in the file always parse back (see
//! `crate::state`).

/// Display mode for numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Significant-digit mode.
    Std,
    /// Fixed number of decimals.
    Fix,
    /// Scientific notation.
    Sci,
    /// Engineering notation (exponent multiple of three).
    Eng,
}

/// Angle unit for trigonometric functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AngleMode {
    Degrees,
    Radians,
    Grads,
    PiRadians,
}

/// Order of day, month and year in dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateOrder {
    Dmy,
    Mdy,
    Ymd,
}

/// Smallest and default precision bounds, in decimal digits.
pub const MIN_PRECISION: u16 = 3;
pub const DEFAULT_PRECISION: u16 = 34;
pub const MAX_PRECISION: u16 = 9999;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Working digits for decimal arithmetic.
    pub precision: u16,
    pub display_mode: DisplayMode,
    /// Displayed digits (significant in Std, decimals in Fix/Sci/Eng).
    pub display_digits: u8,
    /// Exponent threshold above which Std switches to scientific.
    pub standard_exp: u16,
    /// Fix-mode leeway before switching to scientific.
    pub min_significant: i8,
    pub decimal_mark: char,
    /// Digit-group separator glyph.
    pub number_separator: char,
    pub mantissa_spacing: u8,
    pub fraction_spacing: u8,
    /// Always show a trailing decimal mark on integral decimals.
    pub trailing_decimal: bool,
    /// Render exponents with Unicode superscripts.
    pub fancy_exponent: bool,
    pub exponent_separator: char,
    pub angle_mode: AngleMode,
    /// Iteration bound for decimal → fraction conversion.
    pub fraction_iterations: u16,
    /// Digit cutoff for decimal → fraction conversion.
    pub fraction_digits: u16,
    /// Iteration bound for symbolic rewrites.
    pub max_rewrites: u16,
    /// Word size in bits for based-integer arithmetic.
    pub word_size: u16,
    /// Error out when a literal has more digits than the precision keeps.
    pub too_many_digits: bool,
    // Status bar flags; the core only stores and serializes these.
    pub show_date: bool,
    pub show_time: bool,
    pub show_seconds: bool,
    pub show_24h: bool,
    pub show_voltage: bool,
    pub date_order: DateOrder,
    pub date_separator: char,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            precision: DEFAULT_PRECISION,
            display_mode: DisplayMode::Std,
            display_digits: 12,
            standard_exp: 9,
            min_significant: 0,
            decimal_mark: '.',
            number_separator: '\u{2009}', // thin space
            mantissa_spacing: 3,
            fraction_spacing: 5,
            trailing_decimal: true,
            fancy_exponent: true,
            exponent_separator: '⁳',
            angle_mode: AngleMode::Degrees,
            fraction_iterations: 10,
            fraction_digits: 12,
            max_rewrites: 100,
            word_size: 64,
            too_many_digits: true,
            show_date: true,
            show_time: true,
            show_seconds: true,
            show_24h: true,
            show_voltage: true,
            date_order: DateOrder::Dmy,
            date_separator: '/',
        }
    }
}

impl Settings {
    /// Mantissa kigits kept by arithmetic at this precision.
    pub fn kigits(&self) -> usize {
        (self.precision as usize + 2) / 3
    }

    /// Neutral configuration used while writing state files: `.` decimal
    /// mark, plain exponents, standard exponent 1, no digit grouping.
    pub fn for_saving(&self) -> Settings {
        Settings {
            display_mode: DisplayMode::Std,
            standard_exp: 1,
            min_significant: 0,
            decimal_mark: '.',
            mantissa_spacing: 0,
            fraction_spacing: 0,
            trailing_decimal: true,
            fancy_exponent: false,
            exponent_separator: 'E',
            ..self.clone()
        }
    }

    /// Serializes the non-default options as a script of assignment
    /// commands that restores this configuration when executed.
    pub fn save(&self) -> String {
        let dflt = Settings::default();
        let mut out = String::new();
        let mut cmd = |line: String| {
            out.push_str(&line);
            out.push('\n');
        };
        match self.display_mode {
            DisplayMode::Std => {
                if dflt.display_mode != DisplayMode::Std {
                    cmd("Std".into());
                }
            }
            DisplayMode::Fix => cmd(format!("{} Fix", self.display_digits)),
            DisplayMode::Sci => cmd(format!("{} Sci", self.display_digits)),
            DisplayMode::Eng => cmd(format!("{} Eng", self.display_digits)),
        }
        if self.display_mode == DisplayMode::Std && self.display_digits != dflt.display_digits {
            cmd(format!("{} DisplayDigits", self.display_digits));
        }
        if self.precision != dflt.precision {
            cmd(format!("{} Precision", self.precision));
        }
        if self.standard_exp != dflt.standard_exp {
            cmd(format!("{} StandardExponent", self.standard_exp));
        }
        if self.min_significant != dflt.min_significant {
            cmd(format!("{} MinimumSignificantDigits", self.min_significant));
        }
        match self.angle_mode {
            AngleMode::Degrees => {}
            AngleMode::Radians => cmd("Rad".into()),
            AngleMode::Grads => cmd("Grad".into()),
            AngleMode::PiRadians => cmd("PiRadians".into()),
        }
        if self.decimal_mark == ',' {
            cmd("DecimalComma".into());
        }
        if self.number_separator != dflt.number_separator {
            cmd(format!("\"{}\" NumberSeparator", self.number_separator));
        }
        if self.mantissa_spacing != dflt.mantissa_spacing {
            cmd(format!("{} MantissaSpacing", self.mantissa_spacing));
        }
        if self.fraction_spacing != dflt.fraction_spacing {
            cmd(format!("{} FractionSpacing", self.fraction_spacing));
        }
        if !self.trailing_decimal {
            cmd("NoTrailingDecimal".into());
        }
        if !self.fancy_exponent {
            cmd("ClassicExponent".into());
        }
        if self.exponent_separator != dflt.exponent_separator {
            cmd(format!("\"{}\" ExponentSeparator", self.exponent_separator));
        }
        if self.fraction_iterations != dflt.fraction_iterations {
            cmd(format!("{} FractionIterations", self.fraction_iterations));
        }
        if self.fraction_digits != dflt.fraction_digits {
            cmd(format!("{} FractionDigits", self.fraction_digits));
        }
        if self.max_rewrites != dflt.max_rewrites {
            cmd(format!("{} MaxRewrites", self.max_rewrites));
        }
        if self.word_size != dflt.word_size {
            cmd(format!("{} WordSize", self.word_size));
        }
        if self.too_many_digits != dflt.too_many_digits {
            cmd(format!(
                "{} TooManyDigitsErrors",
                self.too_many_digits as u8
            ));
        }
        for (flag, dflt_flag, name) in [
            (self.show_date, dflt.show_date, "ShowDate"),
            (self.show_time, dflt.show_time, "ShowTime"),
            (self.show_seconds, dflt.show_seconds, "ShowSeconds"),
            (self.show_24h, dflt.show_24h, "Show24h"),
            (self.show_voltage, dflt.show_voltage, "ShowVoltage"),
        ] {
            if flag != dflt_flag {
                cmd(format!("{} {}", flag as u8, name));
            }
        }
        match self.date_order {
            DateOrder::Dmy => {}
            DateOrder::Mdy => cmd("MDY".into()),
            DateOrder::Ymd => cmd("YMD".into()),
        }
        if self.date_separator != dflt.date_separator {
            cmd(format!("\"{}\" DateSeparator", self.date_separator));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_documented_values() {
        let s = Settings::default();
        assert_eq!(s.precision, 34);
        assert_eq!(s.display_mode, DisplayMode::Std);
        assert_eq!(s.angle_mode, AngleMode::Degrees);
        assert_eq!(s.kigits(), 12);
    }

    #[test]
    fn default_settings_save_to_empty_script() {
        assert_eq!(Settings::default().save(), "");
    }

    #[test]
    fn changed_settings_appear_in_script() {
        let mut s = Settings::default();
        s.precision = 24;
        s.angle_mode = AngleMode::Radians;
        s.display_mode = DisplayMode::Fix;
        s.display_digits = 4;
        let script = s.save();
        assert!(script.contains("4 Fix"));
        assert!(script.contains("24 Precision"));
        assert!(script.contains("Rad"));
    }

    #[test]
    fn saving_profile_is_neutral() {
        let s = Settings::default().for_saving();
        assert_eq!(s.decimal_mark, '.');
        assert_eq!(s.standard_exp, 1);
        assert!(!s.fancy_exponent);
        assert_eq!(s.mantissa_spacing, 0);
    }
}
