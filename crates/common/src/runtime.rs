/// A runtime API identifier and the version of it which the runtime implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiItem {
    /// Blake2 derived 8 byte identifier of the API.
    pub name: [u8; 8],
    pub version: u32,
}

/// Version information of the currently active runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeVersion {
    pub spec_name: String,
    pub impl_name: String,
    pub authoring_version: u32,
    pub spec_version: u32,
    pub impl_version: u32,
    pub transaction_version: u32,
    pub apis: Vec<ApiItem>,
}

impl RuntimeVersion {
    /// Returns the version of the given API, if the runtime implements it.
    pub fn api_version(&self, name: &[u8; 8]) -> Option<u32> {
        self.apis
            .iter()
            .find(|item| &item.name == name)
            .map(|item| item.version)
    }
}
