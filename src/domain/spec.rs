//! Model specifications and their identity.
//!
//! A spec's identity is a SHA-256 digest over a canonical encoding of its
//! seven identity fields, in this order:
//!
//! `scope, dv, predictors (joined with " + "), year_term, random, extra_fe, engine`
//!
//! Each field is written as `<byte length>:<bytes>\n` after a version tag, so
//! no choice of field contents can make two different specs encode to the
//! same byte string. `rhs` is derived and therefore not part of the identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const ID_ENCODING_TAG: &str = "epps-spec/v1\n";
const TERM_SEP: &str = " + ";

/// Content-derived specification identifier (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecId(String);

impl SpecId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One candidate regression model. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    id: SpecId,
    scope: String,
    dv: String,
    predictors: Vec<String>,
    year_term: String,
    random: String,
    extra_fe: String,
    engine: String,
}

impl ModelSpec {
    pub fn new(
        scope: impl Into<String>,
        dv: impl Into<String>,
        predictors: Vec<String>,
        year_term: impl Into<String>,
        random: impl Into<String>,
        extra_fe: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        let scope = scope.into();
        let dv = dv.into();
        let year_term = year_term.into();
        let random = random.into();
        let extra_fe = extra_fe.into();
        let engine = engine.into();
        let id = spec_id(
            &scope,
            &dv,
            &predictors.join(TERM_SEP),
            &year_term,
            &random,
            &extra_fe,
            &engine,
        );
        Self {
            id,
            scope,
            dv,
            predictors,
            year_term,
            random,
            extra_fe,
            engine,
        }
    }

    pub fn id(&self) -> &SpecId {
        &self.id
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn dv(&self) -> &str {
        &self.dv
    }

    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    pub fn year_term(&self) -> &str {
        &self.year_term
    }

    pub fn random(&self) -> &str {
        &self.random
    }

    pub fn extra_fe(&self) -> &str {
        &self.extra_fe
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn predictors_joined(&self) -> String {
        self.predictors.join(TERM_SEP)
    }

    /// Right-hand side of the model formula: predictors, extra fixed effect,
    /// year term and random term, skipping empty ones. `"1"` when all are empty.
    pub fn rhs(&self) -> String {
        let mut parts: Vec<&str> = self.predictors.iter().map(String::as_str).collect();
        for term in [&self.extra_fe, &self.year_term, &self.random] {
            if !term.is_empty() {
                parts.push(term);
            }
        }
        if parts.is_empty() {
            "1".to_string()
        } else {
            parts.join(TERM_SEP)
        }
    }

    pub fn to_record(&self) -> SpecRecord {
        SpecRecord {
            spec_id: self.id.0.clone(),
            scope: self.scope.clone(),
            dv: self.dv.clone(),
            predictors: self.predictors_joined(),
            year_term: self.year_term.clone(),
            random: self.random.clone(),
            extra_fe: self.extra_fe.clone(),
            engine: self.engine.clone(),
            rhs: self.rhs(),
        }
    }

    /// Rebuild a spec from a batch/grid row, rejecting rows whose stored id
    /// does not match the one recomputed from their fields.
    pub fn from_record(record: SpecRecord) -> Result<Self, String> {
        let predictors = record
            .predictors
            .split(TERM_SEP)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        let spec = Self::new(
            record.scope,
            record.dv,
            predictors,
            record.year_term,
            record.random,
            record.extra_fe,
            record.engine,
        );
        if spec.id.0 != record.spec_id {
            return Err(format!(
                "spec_id '{}' does not match its fields (expected '{}')",
                record.spec_id, spec.id
            ));
        }
        Ok(spec)
    }
}

/// Flat row of the batch protocol, in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRecord {
    pub spec_id: String,
    pub scope: String,
    pub dv: String,
    pub predictors: String,
    pub year_term: String,
    pub random: String,
    pub extra_fe: String,
    pub engine: String,
    pub rhs: String,
}

/// Column names of the batch protocol, in order.
pub const SPEC_COLUMNS: [&str; 9] = [
    "spec_id",
    "scope",
    "dv",
    "predictors",
    "year_term",
    "random",
    "extra_fe",
    "engine",
    "rhs",
];

/// Compute the identity of a spec from its seven fields.
pub fn spec_id(
    scope: &str,
    dv: &str,
    predictors: &str,
    year_term: &str,
    random: &str,
    extra_fe: &str,
    engine: &str,
) -> SpecId {
    let mut hasher = Sha256::new();
    hasher.update(ID_ENCODING_TAG.as_bytes());
    for field in [scope, dv, predictors, year_term, random, extra_fe, engine] {
        hasher.update(field.len().to_string().as_bytes());
        hasher.update(b":");
        hasher.update(field.as_bytes());
        hasher.update(b"\n");
    }
    SpecId(hex::encode(hasher.finalize()))
}
