//! A fully wired worker over an in-memory store and a scripted origin.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use offcache_client::{ClientRegistry, Origin, Worker};
use offcache_core::{AppConfig, CacheDb, Error, RequestDescriptor, ResponseSnapshot};
use rmcp::model::CallToolResult;

pub(crate) struct ScriptedOrigin {
    routes: Mutex<HashMap<String, (u16, &'static str)>>,
    offline: AtomicBool,
}

impl ScriptedOrigin {
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("unreachable: {}", request.url)));
        }
        let route = self.routes.lock().unwrap().get(request.url.as_str()).copied();
        let (status, body) = route.unwrap_or((404, "not found"));
        Ok(ResponseSnapshot::new(status, vec![("content-type".into(), "text/plain".into())], body))
    }
}

pub(crate) struct Harness {
    pub db: Arc<CacheDb>,
    pub origin: Arc<ScriptedOrigin>,
    pub worker: Arc<Worker>,
}

/// Worker for `https://app.example/` whose origin serves every manifest entry.
pub(crate) async fn harness() -> Harness {
    let config = AppConfig { scope: "https://app.example/".into(), ..Default::default() };
    let mut routes = HashMap::new();
    for path in ["", "index.html", "manifest.json", "icon-32.png", "icon-192.png", "icon-512.png"] {
        routes.insert(format!("https://app.example/{path}"), (200, "shell"));
    }
    for url in &config.cdn_assets {
        routes.insert(url.clone(), (200, "lib"));
    }
    routes.insert("https://app.example/api/plans".into(), (200, "[1,2,3]"));

    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let origin = Arc::new(ScriptedOrigin { routes: Mutex::new(routes), offline: AtomicBool::new(false) });
    let worker = Worker::new(&config, db.clone(), origin.clone(), Arc::new(ClientRegistry::new())).unwrap();
    Harness { db, origin, worker: Arc::new(worker) }
}

/// The JSON text a tool returned.
pub(crate) fn output_json(result: &CallToolResult) -> serde_json::Value {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
