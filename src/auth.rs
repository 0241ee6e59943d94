//! Credential and session capabilities backing the login flow.
//!
//! Passwords are stored as bcrypt hashes in the user table; sessions
//! are opaque v4 UUID tokens held server-side, so nothing secret ever
//! travels in the cookie beyond the token itself. The record store is
//! only touched through its user operations here, keeping this module
//! independent of the project-record schema.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use bcrypt::DEFAULT_COST;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{RecordStore, UserRow};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Credenciales invalidas")]
    InvalidCredentials,
    #[error("El usuario es obligatorio")]
    UsernameRequired,
    #[error("La contrasena es obligatoria")]
    PasswordRequired,
    #[error("Las contrasenas no coinciden")]
    PasswordMismatch,
    #[error("La contrasena debe tener al menos {MIN_PASSWORD_LEN} caracteres")]
    PasswordTooShort,
    #[error("Rol invalido")]
    InvalidRole,
    #[error("Este usuario ya existe")]
    UsernameTaken,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "standard" => Some(Role::Standard),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// An authenticated dashboard user, as exposed to handlers and the
/// front-end session payload.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            // Rows predating the role column carry the SQL default.
            role: Role::parse(&row.role).unwrap_or(Role::Standard),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, DEFAULT_COST).map_err(|err| AuthError::Store(err.into()))
}

/// A malformed stored hash counts as a mismatch, not an error.
pub fn verify_password(stored: &str, password: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

/// Server-side session table: opaque token to user id. Sessions live
/// for the process lifetime; a restart logs everyone out.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, i64>>,
}

impl SessionStore {
    pub fn create(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .lock()
            .expect("session table poisoned")
            .insert(token.clone(), user_id);
        token
    }

    pub fn user_id(&self, token: &str) -> Option<i64> {
        self.sessions
            .lock()
            .expect("session table poisoned")
            .get(token)
            .copied()
    }

    pub fn revoke(&self, token: &str) {
        self.sessions
            .lock()
            .expect("session table poisoned")
            .remove(token);
    }
}

/// Checks credentials against the user table and opens a session.
/// Unknown usernames and wrong passwords are indistinguishable to the
/// caller.
pub fn authenticate(
    store: &RecordStore,
    sessions: &SessionStore,
    username: &str,
    password: &str,
) -> Result<(String, User), AuthError> {
    let username = username.trim();
    let Some(row) = store.find_user(username)? else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(&row.password_hash, password) {
        return Err(AuthError::InvalidCredentials);
    }
    let user = User::from(row);
    let token = sessions.create(user.id);
    Ok((token, user))
}

/// Resolves a session token to its user, or `None` when the token is
/// unknown or the user has since disappeared.
pub fn current_user(
    store: &RecordStore,
    sessions: &SessionStore,
    token: &str,
) -> Result<Option<User>> {
    let Some(user_id) = sessions.user_id(token) else {
        return Ok(None);
    };
    let user = store.user_by_id(user_id)?.map(User::from);
    Ok(user)
}

/// Creates a dashboard user, enforcing the account policy: a username,
/// a confirmed password of at least [`MIN_PASSWORD_LEN`] characters,
/// and a known role.
pub fn create_user(
    store: &RecordStore,
    username: &str,
    password: &str,
    confirm: &str,
    role: &str,
) -> Result<User, AuthError> {
    let username = username.trim();
    let role = role.trim();
    let role = if role.is_empty() { "standard" } else { role };
    if username.is_empty() {
        return Err(AuthError::UsernameRequired);
    }
    if password.is_empty() {
        return Err(AuthError::PasswordRequired);
    }
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    let Some(role) = Role::parse(role) else {
        return Err(AuthError::InvalidRole);
    };

    let hash = hash_password(password)?;
    if !store.insert_user(username, &hash, role.as_str())? {
        return Err(AuthError::UsernameTaken);
    }
    let row = store
        .find_user(username)?
        .ok_or_else(|| AuthError::Store(anyhow::anyhow!("User vanished after insert")))?;
    Ok(User::from(row))
}

/// Creates the bootstrap `admin` account once, when an admin code is
/// configured and no admin exists yet.
pub fn ensure_initial_admin(store: &RecordStore, admin_code: Option<&str>) -> Result<()> {
    let Some(code) = admin_code.filter(|code| !code.is_empty()) else {
        warn!("AVANCE_ADMIN_CODE no esta definido; no se creo el administrador inicial.");
        return Ok(());
    };
    if store.has_admin()? {
        return Ok(());
    }
    let hash = hash_password(code)?;
    store.insert_user("admin", &hash, Role::Admin.as_str())?;
    info!("Usuario administrador inicial 'admin' creado.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RecordStore {
        let store = RecordStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        store
    }

    /// Low-cost hash for tests; `verify` honors the cost embedded in
    /// the hash itself.
    fn quick_hash(password: &str) -> String {
        bcrypt::hash(password, 4).expect("hash")
    }

    #[test]
    fn verify_password_accepts_only_the_original() {
        let hash = quick_hash("hunter2hunter2");
        assert!(verify_password(&hash, "hunter2hunter2"));
        assert!(!verify_password(&hash, "hunter2"));
        assert!(!verify_password("not-a-bcrypt-hash", "hunter2hunter2"));
    }

    #[test]
    fn authenticate_round_trip_and_revocation() {
        let store = store();
        store
            .insert_user("maria", &quick_hash("segura123"), "standard")
            .expect("insert");
        let sessions = SessionStore::default();

        assert!(matches!(
            authenticate(&store, &sessions, "maria", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate(&store, &sessions, "nadie", "segura123"),
            Err(AuthError::InvalidCredentials)
        ));

        let (token, user) = authenticate(&store, &sessions, "  maria ", "segura123")
            .expect("valid credentials");
        assert_eq!(user.username, "maria");
        assert_eq!(user.role, Role::Standard);

        let resolved = current_user(&store, &sessions, &token)
            .expect("lookup")
            .expect("session active");
        assert_eq!(resolved.id, user.id);

        sessions.revoke(&token);
        assert!(current_user(&store, &sessions, &token).expect("lookup").is_none());
        assert!(current_user(&store, &sessions, "unknown-token")
            .expect("lookup")
            .is_none());
    }

    #[test]
    fn create_user_enforces_the_account_policy() {
        let store = store();
        let cases = [
            ("", "password1", "password1", "standard", "usuario"),
            ("ana", "", "", "standard", "contrasena es obligatoria"),
            ("ana", "password1", "password2", "standard", "no coinciden"),
            ("ana", "corta", "corta", "standard", "al menos"),
            ("ana", "password1", "password1", "superuser", "Rol invalido"),
        ];
        for (username, password, confirm, role, needle) in cases {
            let err = create_user(&store, username, password, confirm, role)
                .expect_err("policy violation");
            assert!(
                err.to_string().contains(needle),
                "expected '{needle}' in '{err}'"
            );
        }

        let user = create_user(&store, "ana", "password1", "password1", "").expect("create");
        assert_eq!(user.role, Role::Standard);
        assert!(matches!(
            create_user(&store, "ana", "password1", "password1", "admin"),
            Err(AuthError::UsernameTaken)
        ));
    }

    #[test]
    fn initial_admin_bootstrap_is_idempotent() {
        let store = store();
        ensure_initial_admin(&store, None).expect("no code");
        assert!(!store.has_admin().expect("query"));

        ensure_initial_admin(&store, Some("clave-inicial")).expect("bootstrap");
        assert!(store.has_admin().expect("query"));

        // A second run must not fail or add another admin.
        ensure_initial_admin(&store, Some("otra-clave")).expect("repeat");
        let admin = store.find_user("admin").expect("find").expect("present");
        assert!(verify_password(&admin.password_hash, "clave-inicial"));
    }
}
