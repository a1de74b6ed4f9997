//! Transform options and the per-revision emission policy.
//!
//! The four supported revisions of the decorator proposal differ in which
//! runtime helper they call, how the element flag packs `static`, whether
//! decorator receivers are tracked, and whether the helper returns a flat
//! array or an `{e, c}` pair. `VersionPolicy` makes that branching explicit;
//! everything downstream consults the policy instead of the version string.

use serde::Deserialize;

use crate::helpers::Helper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum DecoratorVersion {
    #[serde(rename = "2021-12")]
    V2021_12,
    #[serde(rename = "2022-03")]
    V2022_03,
    #[serde(rename = "2023-01")]
    V2023_01,
    #[default]
    #[serde(rename = "2023-05")]
    V2023_05,
}

impl DecoratorVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2021_12 => "2021-12",
            Self::V2022_03 => "2022-03",
            Self::V2023_01 => "2023-01",
            Self::V2023_05 => "2023-05",
        }
    }

    pub fn policy(self) -> &'static VersionPolicy {
        match self {
            Self::V2021_12 => &POLICY_2021_12,
            Self::V2022_03 => &POLICY_2022_03,
            Self::V2023_01 => &POLICY_2023_01,
            Self::V2023_05 => &POLICY_2023_05,
        }
    }
}

const POLICY_2021_12: VersionPolicy = VersionPolicy {
    helper: Helper::ApplyDecs,
    static_is_bit: false,
    track_receivers: false,
    pass_super_class: false,
    brand_check: false,
    flat_result: true,
    class_decs_flag: false,
};

const POLICY_2022_03: VersionPolicy = VersionPolicy {
    helper: Helper::ApplyDecs2203R,
    static_is_bit: false,
    track_receivers: false,
    pass_super_class: false,
    brand_check: false,
    flat_result: false,
    class_decs_flag: false,
};

const POLICY_2023_01: VersionPolicy = VersionPolicy {
    helper: Helper::ApplyDecs2301,
    static_is_bit: false,
    track_receivers: false,
    pass_super_class: false,
    brand_check: true,
    flat_result: false,
    class_decs_flag: false,
};

const POLICY_2023_05: VersionPolicy = VersionPolicy {
    helper: Helper::ApplyDecs2305,
    static_is_bit: true,
    track_receivers: true,
    pass_super_class: true,
    brand_check: true,
    flat_result: false,
    class_decs_flag: true,
};

/// How one revision shapes the emitted `applyDecs*` call.
#[derive(Debug, Clone, Copy)]
pub struct VersionPolicy {
    pub helper: Helper,
    /// `static` is bit 3 of the element flag; older revisions add the
    /// literal 5 instead, overlapping with the kind values the older
    /// runtimes expect.
    pub static_is_bit: bool,
    /// Member-expression decorators keep their receiver, and decorator
    /// arrays become `[thisArg, decorator]` pairs.
    pub track_receivers: bool,
    /// The superclass expression is memoized and passed through to the
    /// helper.
    pub pass_super_class: bool,
    /// The helper accepts an instance brand-check closure.
    pub brand_check: bool,
    /// The helper returns one flat array instead of `{e, c}`.
    pub flat_result: bool,
    /// The helper takes the class-decorations flag argument.
    pub class_decs_flag: bool,
}

impl VersionPolicy {
    /// Packs the second entry of a decoration tuple.
    pub fn element_flag(&self, kind: u8, is_static: bool, has_receiver: bool) -> u32 {
        let mut flag = u32::from(kind);
        if is_static {
            if self.static_is_bit {
                flag |= 8;
            } else {
                flag += 5;
            }
        }
        if has_receiver {
            flag |= 16;
        }
        flag
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformOptions {
    #[serde(default = "default_true")]
    pub source_maps: bool,
    #[serde(default)]
    pub version: DecoratorVersion,
    /// Assumes the superclass binding is never reassigned, so `super.x`
    /// inside extracted private-method bodies can be rewritten against it
    /// directly.
    #[serde(default)]
    pub constant_super: Option<bool>,
    /// Deprecated; only supplies the default for `constant_super`.
    #[serde(default)]
    pub loose: Option<bool>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self { source_maps: true, version: DecoratorVersion::default(), constant_super: None, loose: None }
    }
}

impl TransformOptions {
    /// The assumption wins over the deprecated `loose` switch.
    pub fn constant_super(&self) -> bool {
        self.constant_super.or(self.loose).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_strings_round_trip() {
        for (text, version) in [
            ("2021-12", DecoratorVersion::V2021_12),
            ("2022-03", DecoratorVersion::V2022_03),
            ("2023-01", DecoratorVersion::V2023_01),
            ("2023-05", DecoratorVersion::V2023_05),
        ] {
            let parsed: DecoratorVersion =
                serde_json::from_str(&format!("\"{text}\"")).unwrap();
            assert_eq!(parsed, version);
            assert_eq!(parsed.as_str(), text);
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        let parsed = serde_json::from_str::<DecoratorVersion>("\"2020-01\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn default_version_is_newest() {
        assert_eq!(DecoratorVersion::default(), DecoratorVersion::V2023_05);
    }

    #[test]
    fn static_flag_is_a_bit_only_in_newest_revision() {
        // method = 2
        let newest = DecoratorVersion::V2023_05.policy();
        assert_eq!(newest.element_flag(2, true, false), 10);
        for older in [
            DecoratorVersion::V2021_12,
            DecoratorVersion::V2022_03,
            DecoratorVersion::V2023_01,
        ] {
            assert_eq!(older.policy().element_flag(2, true, false), 7);
        }
    }

    #[test]
    fn receiver_bit_sits_above_static() {
        let policy = DecoratorVersion::V2023_05.policy();
        // setter = 4, static, with receiver
        assert_eq!(policy.element_flag(4, true, true), 4 | 8 | 16);
        assert_eq!(policy.element_flag(0, false, true), 16);
    }

    #[test]
    fn constant_super_defaults_from_loose() {
        let from_loose: TransformOptions =
            serde_json::from_str(r#"{"loose": true}"#).unwrap();
        assert!(from_loose.constant_super());

        let assumption_wins: TransformOptions =
            serde_json::from_str(r#"{"loose": true, "constant_super": false}"#).unwrap();
        assert!(!assumption_wins.constant_super());

        assert!(!TransformOptions::default().constant_super());
    }
}
