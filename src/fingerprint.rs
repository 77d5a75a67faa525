//! Deterministic cache fingerprints.
//!
//! A fingerprint identifies one unique combination of asset and presentation
//! parameters. Semantically identical requests (same owner, asset, *set* of
//! relevant accept values, extension and transform chain) always hash to the
//! same fingerprint, so concurrent writers racing on the same request produce
//! byte-identical cache entries.
//!
//! Changing the concatenation scheme orphans every previously written cache
//! entry: old files stay on disk but are never looked up again.

use std::fmt;

use sha2::{Digest, Sha256};

/// Delimiter between rendered transform descriptors in the digest input.
const CHAIN_DELIMITER: &str = "&";
/// Delimiter between normalized accept values in the digest input.
const ACCEPT_DELIMITER: &str = ",";
/// Accept value assumed when the client sent none.
const DEFAULT_ACCEPT: &str = "*/*";

/// One step of a transformation chain, e.g. `resize:width=200,height=100`.
///
/// Parameter order is preserved: transformations are not commutative and the
/// descriptor renders into the fingerprint exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformDescriptor {
    name: String,
    params: Vec<(String, String)>,
}

impl TransformDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Canonical textual form used for fingerprinting.
    pub fn canonical(&self) -> String {
        if self.params.is_empty() {
            return self.name.clone();
        }

        let params = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");

        format!("{}:{}", self.name, params)
    }
}

/// Request attributes that determine the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintInput {
    owner_id: String,
    asset_id: String,
    accept: Option<String>,
    variant_extension: Option<String>,
    transform_chain: Vec<TransformDescriptor>,
}

impl FingerprintInput {
    pub fn new(owner_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            asset_id: asset_id.into(),
            accept: None,
            variant_extension: None,
            transform_chain: Vec::new(),
        }
    }

    /// Raw `Accept` header value; normalization happens at digest time.
    pub fn with_accept(mut self, accept: Option<String>) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_extension(mut self, extension: Option<String>) -> Self {
        self.variant_extension = extension;
        self
    }

    pub fn with_transform_chain(mut self, chain: Vec<TransformDescriptor>) -> Self {
        self.transform_chain = chain;
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn variant_extension(&self) -> Option<&str> {
        self.variant_extension.as_deref()
    }

    pub fn transform_chain(&self) -> &[TransformDescriptor] {
        &self.transform_chain
    }

    /// Accept values that participate in the fingerprint, as a sorted set.
    pub fn normalized_accept(&self) -> String {
        normalize_accept(self.accept.as_deref())
    }

    /// Digest the input into its fingerprint.
    pub fn fingerprint(&self) -> Fingerprint {
        let chain = self
            .transform_chain
            .iter()
            .map(TransformDescriptor::canonical)
            .collect::<Vec<_>>()
            .join(CHAIN_DELIMITER);

        let mut hasher = Sha256::new();
        hasher.update(self.owner_id.as_bytes());
        hasher.update(self.asset_id.as_bytes());
        hasher.update(self.normalized_accept().as_bytes());
        hasher.update(self.variant_extension.as_deref().unwrap_or("").as_bytes());
        hasher.update(chain.as_bytes());

        Fingerprint(hasher.finalize().into())
    }
}

/// Reduce a raw `Accept` header to the values that can change the response.
///
/// Entries are split on commas, trimmed, stripped of `;` parameters, and kept
/// only when they are `*/…` wildcards or `image/…` types. The survivors are
/// sorted and deduplicated so header ordering never changes the fingerprint.
pub fn normalize_accept(raw: Option<&str>) -> String {
    let raw = match raw {
        Some(value) if !value.trim().is_empty() => value,
        _ => DEFAULT_ACCEPT,
    };

    let mut kept: Vec<&str> = raw
        .split(',')
        .filter_map(|part| {
            let media_type = part.split(';').next().unwrap_or("").trim();
            (media_type.starts_with("*/") || media_type.starts_with("image/"))
                .then_some(media_type)
        })
        .collect();

    kept.sort_unstable();
    kept.dedup();
    kept.join(ACCEPT_DELIMITER)
}

/// A 256-bit digest identifying one cached artifact.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering used for on-disk paths.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_input() -> FingerprintInput {
        FingerprintInput::new("abc", "d41d8cd98f00b204e9800998ecf8427e")
            .with_accept(Some("text/html, image/png;q=0.9, */*".to_string()))
            .with_extension(Some("jpg".to_string()))
    }

    #[test]
    fn accept_normalization_keeps_wildcards_and_images_sorted() {
        let input = base_input();
        assert_eq!(input.normalized_accept(), "*/*,image/png");
    }

    #[test]
    fn accept_defaults_to_wildcard_when_missing_or_empty() {
        assert_eq!(normalize_accept(None), "*/*");
        assert_eq!(normalize_accept(Some("  ")), "*/*");
    }

    #[test]
    fn accept_drops_non_image_types_entirely() {
        assert_eq!(normalize_accept(Some("text/html, application/json")), "");
    }

    #[test]
    fn accept_deduplicates_repeated_values() {
        assert_eq!(
            normalize_accept(Some("image/png, image/png;q=0.5")),
            "image/png"
        );
    }

    #[test]
    fn accept_ordering_does_not_change_the_fingerprint() {
        let a = base_input();
        let b = FingerprintInput::new("abc", "d41d8cd98f00b204e9800998ecf8427e")
            .with_accept(Some("*/*, text/html, image/png".to_string()))
            .with_extension(Some("jpg".to_string()));

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn every_field_participates_in_the_fingerprint() {
        let base = base_input().fingerprint();

        let other_owner = FingerprintInput::new("abd", "d41d8cd98f00b204e9800998ecf8427e")
            .with_accept(Some("text/html, image/png;q=0.9, */*".to_string()))
            .with_extension(Some("jpg".to_string()));
        assert_ne!(other_owner.fingerprint(), base);

        let other_asset = FingerprintInput::new("abc", "other-asset")
            .with_accept(Some("text/html, image/png;q=0.9, */*".to_string()))
            .with_extension(Some("jpg".to_string()));
        assert_ne!(other_asset.fingerprint(), base);

        let other_accept = base_input().with_accept(Some("image/webp".to_string()));
        assert_ne!(other_accept.fingerprint(), base);

        let other_extension = base_input().with_extension(Some("png".to_string()));
        assert_ne!(other_extension.fingerprint(), base);

        let with_chain =
            base_input().with_transform_chain(vec![TransformDescriptor::new("flipHorizontally")]);
        assert_ne!(with_chain.fingerprint(), base);
    }

    #[test]
    fn transform_chain_order_is_significant() {
        let resize = TransformDescriptor::new("resize")
            .with_param("width", "200")
            .with_param("height", "100");
        let border = TransformDescriptor::new("border").with_param("color", "000");

        let ab = base_input().with_transform_chain(vec![resize.clone(), border.clone()]);
        let ba = base_input().with_transform_chain(vec![border, resize]);

        assert_ne!(ab.fingerprint(), ba.fingerprint());
    }

    #[test]
    fn descriptor_canonical_form_preserves_param_order() {
        let descriptor = TransformDescriptor::new("resize")
            .with_param("width", "200")
            .with_param("height", "100");
        assert_eq!(descriptor.canonical(), "resize:width=200,height=100");
        assert_eq!(TransformDescriptor::new("strip").canonical(), "strip");
    }

    #[test]
    fn identical_inputs_share_a_fingerprint() {
        assert_eq!(base_input().fingerprint(), base_input().fingerprint());
        assert_eq!(base_input().fingerprint().to_hex().len(), 64);
    }
}
