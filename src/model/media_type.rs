//! Docker media type constants

pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// Accept header value sent with every manifest request, listing both
/// supported schema 2 media types.
pub fn v2_accept() -> String {
    format!("{},{}", MANIFEST_V2, MANIFEST_LIST)
}
