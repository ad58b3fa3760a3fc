#![allow(dead_code)]

use appspark::api::ApiClient;
use appspark::api::models::{LotId, Role, User};
use appspark::error::ClientError;
use appspark::session::Session;
use appspark::session::memory::MemoryStore;
use axum::Router;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn start_backend(router: Router) -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

/// Shared hit counter for mock handlers.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn customer() -> User {
    User {
        id: 5,
        nombre: "Carla".to_string(),
        email: "carla@example.com".to_string(),
        rol: Role::Usuario,
    }
}

pub fn owner() -> User {
    User {
        id: 9,
        nombre: "Omar".to_string(),
        email: "omar@example.com".to_string(),
        rol: Role::Duenio,
    }
}

pub fn lot_json(id: LotId, total: u32, free: u32) -> Value {
    json!({
        "id": id,
        "nombre": format!("Lot {id}"),
        "direccion": "Av. Principal #123",
        "horario": "24 horas",
        "precio": 25.0,
        "espacios_total": total,
        "espacios_disponibles": free,
        "duenio_id": 9,
        "fecha_creacion": "2025-01-10T08:00:00",
        "activo": true
    })
}

pub fn anonymous_session() -> (Arc<MemoryStore>, Arc<Session>) {
    let store = Arc::new(MemoryStore::new());
    let session = Arc::new(Session::init(Box::new(Arc::clone(&store))));
    (store, session)
}

pub fn signed_in_session(
    user: User,
    token: &str,
) -> Result<(Arc<MemoryStore>, Arc<Session>), ClientError> {
    let (store, session) = anonymous_session();
    session.login(user, token.to_string())?;
    Ok((store, session))
}

pub fn client(base_url: &str, session: Arc<Session>) -> Result<ApiClient, ClientError> {
    ApiClient::new(base_url, Duration::from_secs(5), session)
}
