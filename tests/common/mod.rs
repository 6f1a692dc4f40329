//! Common test utilities - EncounterTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use encounterd::{Config, Server};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Test harness that spawns a real encounterd server on a random port
pub struct EncounterTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl EncounterTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(Config::default()).await
    }

    /// Start a server with the given config; the bind address is replaced
    pub async fn start_with(mut config: Config) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        config.bind_addr = addr;
        config.db_path = None;
        if config.dice_seed.is_none() {
            config.dice_seed = Some(7);
        }

        let server = Arc::new(Server::new(config).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .put(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Get direct access to the database for test setup/assertions
    pub fn db(&self) -> Arc<encounterd::db::Database> {
        self.server.db()
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }

    /// Create a character and return its ID
    pub async fn create_character(&self, name: &str, max_hp: i64, dexterity: i64) -> Result<i64> {
        let resp = self
            .post(
                "/characters",
                &json!({"name": name, "maxHitPoints": max_hp, "dexterity": dexterity}),
            )
            .await?;
        anyhow::ensure!(resp.status() == 201, "create character: {}", resp.status());
        let body: Value = resp.json().await?;
        body["id"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("character response has no id"))
    }

    /// Create an encounter and return its ID
    pub async fn create_encounter(&self, name: &str) -> Result<i64> {
        let resp = self.post("/encounters", &json!({"name": name})).await?;
        anyhow::ensure!(resp.status() == 201, "create encounter: {}", resp.status());
        let body: Value = resp.json().await?;
        body["id"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("encounter response has no id"))
    }

    /// Start an encounter and return the encounter body
    pub async fn start_encounter(&self, id: i64) -> Result<Value> {
        let resp = self
            .post(&format!("/encounters/{}/start", id), &json!({}))
            .await?;
        anyhow::ensure!(resp.status() == 200, "start encounter: {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Active participants of an encounter in turn order
    pub async fn participants(&self, id: i64) -> Result<Vec<Value>> {
        let resp = self.get(&format!("/encounters/{}/participants", id)).await?;
        anyhow::ensure!(resp.status() == 200, "participants: {}", resp.status());
        Ok(resp.json().await?)
    }

    /// Apply an action and return the raw response
    pub async fn act(
        &self,
        encounter_id: i64,
        actor: i64,
        kind: &str,
        target: Option<i64>,
        payload: Value,
    ) -> Result<reqwest::Response> {
        self.post(
            &format!("/encounters/{}/actions", encounter_id),
            &json!({
                "actorParticipantId": actor,
                "actionKind": kind,
                "targetParticipantId": target,
                "payload": payload,
            }),
        )
        .await
    }
}
