use crate::transport::{BlockingTransport, Transport};
use crate::types::HtsSourceVersion;
use crate::{ApiRequest, Result};

const VERSIONS_PATH: &str = "/versions";

/// HTS source versions, async flavor.
#[derive(Debug)]
pub struct Versions<'a, C> {
    transport: &'a C,
}

impl<'a, C: Transport> Versions<'a, C> {
    pub(crate) fn new(transport: &'a C) -> Self {
        Self { transport }
    }

    /// Lists every HTS revision the API knows about.
    ///
    /// Calls `GET /versions`.
    pub async fn list(&self) -> Result<C::Response<Vec<HtsSourceVersion>>> {
        self.transport
            .send::<Vec<HtsSourceVersion>>(ApiRequest::get(VERSIONS_PATH))
            .await
    }
}

/// HTS source versions, blocking flavor.
#[derive(Debug)]
pub struct BlockingVersions<'a, C> {
    transport: &'a C,
}

impl<'a, C: BlockingTransport> BlockingVersions<'a, C> {
    pub(crate) fn new(transport: &'a C) -> Self {
        Self { transport }
    }

    /// Lists every HTS revision the API knows about.
    pub fn list(&self) -> Result<C::Response<Vec<HtsSourceVersion>>> {
        self.transport
            .send::<Vec<HtsSourceVersion>>(ApiRequest::get(VERSIONS_PATH))
    }
}
