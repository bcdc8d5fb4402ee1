//! Canonicalization of record and metric names into Prometheus metric names.
//!
//! Internal metric systems name things in a variety of styles: `RpcTime`, `OMInfoKeys`,
//! `NumBlocksAllocated-RATIS-THREE-<uuid>`, `GcTimeMillisG1 Young Generation`, or names that are
//! already snake-cased upstream like `Rocksdb_om.db`.  Every record/metric pair is mapped into a
//! single lowercase, underscore-delimited name matching `[a-z_][a-z0-9_.]*`.

use crate::common::Matcher;

/// How a record's names are turned into a Prometheus name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NamingMode {
    /// The names are already formatted upstream, and are only lowercased.
    Opaque,
    /// The names are split into tokens on case transitions and non-alphanumeric characters.
    Structured,
}

/// Maps `(record name, metric name)` pairs to Prometheus metric names.
///
/// Canonicalization is a pure function of its inputs and the configured opaque matchers: the same
/// pair always produces the same name.  With the default matchers, the output of a
/// canonicalization is also left untouched when fed back in as a record name.  Custom matchers do
/// not carry that guarantee, since a canonical name may no longer match the matcher that selected
/// its record.
#[derive(Clone, Debug)]
pub struct Canonicalizer {
    opaque: Vec<Matcher>,
}

impl Canonicalizer {
    /// Creates a new [`Canonicalizer`] treating records matching any of `opaque` as pre-formatted.
    pub fn new<I>(opaque: I) -> Self
    where
        I: IntoIterator<Item = Matcher>,
    {
        Self { opaque: opaque.into_iter().map(Matcher::lowercased).collect() }
    }

    /// Gets the matchers that select opaque record names.
    pub fn default_opaque_matchers() -> Vec<Matcher> {
        vec![Matcher::Prefix("rocksdb_".to_owned()), Matcher::Contains(".".to_owned())]
    }

    /// Determines which naming mode applies to the given record name.
    pub fn mode(&self, record_name: &str) -> NamingMode {
        if record_name.is_empty() {
            return NamingMode::Structured;
        }

        let lowered = record_name.to_ascii_lowercase();
        if self.opaque.iter().any(|m| m.matches(&lowered)) {
            NamingMode::Opaque
        } else {
            NamingMode::Structured
        }
    }

    /// Converts a record name and metric name into a Prometheus metric name.
    ///
    /// Never fails: degenerate inputs still produce a valid, possibly minimal, name.
    pub fn canonicalize(&self, record_name: &str, metric_name: &str) -> String {
        let (record, metric) = match self.mode(record_name) {
            NamingMode::Opaque => (lowercase_part(record_name), lowercase_part(metric_name)),
            NamingMode::Structured => (split_part(record_name), split_part(metric_name)),
        };

        let mut name = String::with_capacity(record.len() + metric.len() + 2);
        for part in [record, metric] {
            if part.is_empty() {
                continue;
            }
            if !name.is_empty() {
                name.push('_');
            }
            name.push_str(&part);
        }

        match name.chars().next() {
            None => name.push('_'),
            Some(c) if !valid_name_start_character(c) => name.insert(0, '_'),
            Some(_) => {}
        }

        name
    }
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Canonicalizer::new(Canonicalizer::default_opaque_matchers())
    }
}

/// Lowercases a pre-formatted name, replacing only characters that can never appear in a name.
fn lowercase_part(part: &str) -> String {
    part.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if valid_name_character(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Splits a camel-cased name into lowercase, underscore-delimited tokens.
fn split_part(part: &str) -> String {
    let chars = part.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(part.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            push_boundary(&mut out);
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, char::is_ascii_lowercase);

            // `rpcTime`, `G1Young`, and the last capital of an acronym: `OMRpc`.
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                push_boundary(&mut out);
            }
        }

        out.push(c.to_ascii_lowercase());
    }

    if out.ends_with('_') {
        out.pop();
    }

    out
}

#[inline]
fn push_boundary(out: &mut String) {
    if !out.is_empty() && !out.ends_with('_') {
        out.push('_');
    }
}

#[inline]
fn valid_name_start_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-z_].
    c.is_ascii_lowercase() || c == '_'
}

#[inline]
fn valid_name_character(c: char) -> bool {
    // Essentially, needs to match the regex pattern of [a-z0-9_.].
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::{valid_name_character, valid_name_start_character, Canonicalizer, NamingMode};
    use crate::common::Matcher;
    use proptest::prelude::*;

    fn canonicalize(record: &str, metric: &str) -> String {
        Canonicalizer::default().canonicalize(record, metric)
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(canonicalize("RpcTime", "SomeMetrics"), "rpc_time_some_metrics");
        assert_eq!(canonicalize("OMRpcTime", "OMInfoKeys"), "om_rpc_time_om_info_keys");
        assert_eq!(canonicalize("RpcTime", "small"), "rpc_time_small");
    }

    #[test]
    fn test_rocksdb() {
        assert_eq!(
            canonicalize("Rocksdb_om.db", "num_open_connections"),
            "rocksdb_om.db_num_open_connections"
        );
    }

    #[test]
    fn test_pipeline() {
        let record = "SCMPipelineMetrics";
        let metric = "NumBlocksAllocated-RATIS-THREE-47659e3d-40c9-43b3-9792-4982fc279aba";

        assert_eq!(
            canonicalize(record, metric),
            concat!(
                "scm_pipeline_metrics_",
                "num_blocks_allocated_",
                "ratis_three_47659e3d_40c9_43b3_9792_4982fc279aba",
            )
        );
    }

    #[test]
    fn test_spaces() {
        assert_eq!(
            canonicalize("JvmMetrics", "GcTimeMillisG1 Young Generation"),
            "jvm_metrics_gc_time_millis_g1_young_generation"
        );
    }

    #[test]
    fn test_known_cases() {
        let cases = &[
            ("TestMetrics", "NumBucketCreateFails", "test_metrics_num_bucket_create_fails"),
            ("RpcMetrics", "COUNTER", "rpc_metrics_counter"),
            ("rpc_time", "some_metrics", "rpc_time_some_metrics"),
            ("ABC1Def", "x", "abc1_def_x"),
            ("--Rpc--", "__Time__", "rpc_time"),
            ("", "Foo", "foo"),
            ("Foo", "", "foo"),
            ("", "", "_"),
            ("***", "!!!", "_"),
            ("2ndLevel", "Cache", "_2nd_level_cache"),
            ("Ünïcode", "Métric", "n_code_m_tric"),
        ];

        for (record, metric, expected) in cases {
            assert_eq!(*expected, canonicalize(record, metric), "({record}, {metric})");
        }
    }

    #[test]
    fn test_opaque_mode_selection() {
        let canonicalizer = Canonicalizer::default();

        assert_eq!(canonicalizer.mode("Rocksdb_om.db"), NamingMode::Opaque);
        assert_eq!(canonicalizer.mode("ROCKSDB_scm.db"), NamingMode::Opaque);
        assert_eq!(canonicalizer.mode("jvm.metrics"), NamingMode::Opaque);
        assert_eq!(canonicalizer.mode("RocksDbMetrics"), NamingMode::Structured);
        assert_eq!(canonicalizer.mode(""), NamingMode::Structured);
    }

    #[test]
    fn test_opaque_mode_keeps_tokens() {
        let canonicalizer = Canonicalizer::default();

        assert_eq!(
            canonicalizer.canonicalize("Rocksdb_om.db", "BlockCacheHits"),
            "rocksdb_om.db_blockcachehits"
        );
        assert_eq!(
            canonicalizer.canonicalize("Rocksdb_om-2.db", "num-keys"),
            "rocksdb_om_2.db_num_keys"
        );
    }

    #[test]
    fn test_custom_opaque_matchers() {
        let canonicalizer = Canonicalizer::new(vec![Matcher::Full("LegacyCache".to_owned())]);

        assert_eq!(canonicalizer.mode("legacycache"), NamingMode::Opaque);
        assert_eq!(canonicalizer.canonicalize("LegacyCache", "HitRatio"), "legacycache_hitratio");

        // Without the dot matcher, dotted names are split like any other.
        assert_eq!(canonicalizer.canonicalize("jvm.Metrics", "HeapUsed"), "jvm_metrics_heap_used");

        let structured_only = Canonicalizer::new(Vec::new());
        assert_eq!(
            structured_only.canonicalize("Rocksdb_om.db", "num_open_connections"),
            "rocksdb_om_db_num_open_connections"
        );
    }

    #[test]
    fn test_custom_opaque_output_is_not_a_fixed_point() {
        let canonicalizer = Canonicalizer::new(vec![Matcher::Full("foo__bar".to_owned())]);

        let first = canonicalizer.canonicalize("Foo__Bar", "x");
        assert_eq!(first, "foo__bar_x");

        // `foo__bar_x` no longer matches, so it is split like any structured name.
        assert_eq!(canonicalizer.mode(&first), NamingMode::Structured);
        assert_eq!(canonicalizer.canonicalize(&first, ""), "foo_bar_x");
    }

    proptest! {
        #[test]
        fn test_canonical_name_grammar(record in ".*", metric in ".*") {
            let result = canonicalize(&record, &metric);
            let as_chars = result.chars().collect::<Vec<_>>();

            assert!(!as_chars.is_empty(), "canonical name was empty");
            assert!(valid_name_start_character(as_chars[0]),
                "first character of canonical name was not valid: {}", result);
            assert!(as_chars.iter().all(|c| valid_name_character(*c)),
                "invalid character in canonical name: {}", result);
        }

        #[test]
        fn test_structured_names_have_no_empty_tokens(
            record in "[A-Za-z0-9 _-]*",
            metric in "[A-Za-z0-9 _-]*",
        ) {
            let result = Canonicalizer::new(Vec::new()).canonicalize(&record, &metric);
            assert!(!result.contains("__"), "consecutive underscores in {}", result);
        }

        #[test]
        fn test_canonicalize_is_deterministic_and_stable(record in ".*", metric in ".*") {
            let canonicalizer = Canonicalizer::default();
            let first = canonicalizer.canonicalize(&record, &metric);
            let second = canonicalizer.canonicalize(&record, &metric);
            assert_eq!(&first, &second);

            // An already canonical name passes through unchanged.
            assert_eq!(canonicalizer.canonicalize(&first, ""), first);
        }
    }
}
