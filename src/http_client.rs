use std::collections::HashMap;
use std::time::Duration;

use reqwest::Proxy;
use reqwest::blocking::Client;

use crate::egress::EgressIdentity;
use crate::error::Result;

pub const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) lineup_predictors/0.1";

pub fn build_client(identity: Option<&EgressIdentity>, timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder().timeout(timeout).user_agent(USER_AGENT);
    if let Some(identity) = identity {
        builder = builder.proxy(Proxy::all(identity.proxy_url())?);
    }
    Ok(builder.build()?)
}

#[derive(Debug)]
pub struct ClientPool {
    timeout: Duration,
    direct: Option<Client>,
    proxied: HashMap<String, Client>,
}

impl ClientPool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            direct: None,
            proxied: HashMap::new(),
        }
    }

    pub fn client_for(&mut self, identity: Option<&EgressIdentity>) -> Result<Client> {
        let Some(identity) = identity else {
            if let Some(client) = self.direct.as_ref() {
                return Ok(client.clone());
            }
            let client = build_client(None, self.timeout)?;
            self.direct = Some(client.clone());
            return Ok(client);
        };

        let key = identity.proxy_url();
        if let Some(client) = self.proxied.get(&key) {
            return Ok(client.clone());
        }
        let client = build_client(Some(identity), self.timeout)?;
        self.proxied.insert(key, client.clone());
        Ok(client)
    }
}

impl Default for ClientPool {
    fn default() -> Self {
        Self::new(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }
}
