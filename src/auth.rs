use rand::Rng;
use sqlx::SqlitePool;
use tower_cookies::{Cookie, Cookies};

use whoknows::models::User;

pub const SESSION_COOKIE_NAME: &str = "session";

/// Session lifetime (7 days) / 会话有效期
const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: i64,
}

// 生成随机token
fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Persist a new session for the user / 创建会话
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<Session, sqlx::Error> {
    let now = chrono::Utc::now();
    let session = Session {
        id: generate_token(),
        user_id,
        expires_at: now.timestamp() + SESSION_TTL_SECS,
    };

    sqlx::query("INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.id)
        .bind(session.user_id)
        .bind(session.expires_at)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(session)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired sessions, returns how many were deleted
pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Resolve the logged in user from the session cookie / 获取当前登录用户
///
/// Without a cookie the database is not queried.
pub async fn current_user(cookies: &Cookies, pool: &SqlitePool) -> Result<Option<User>, sqlx::Error> {
    let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) else {
        return Ok(None);
    };
    let token = cookie.value().to_string();
    if token.is_empty() {
        return Ok(None);
    }

    sqlx::query_as::<_, User>(
        r#"SELECT u.id, u.username, u.email, u.password_hash, u.created_at
           FROM users u
           INNER JOIN sessions s ON u.id = s.user_id
           WHERE s.id = ? AND s.expires_at > ?"#,
    )
    .bind(&token)
    .bind(chrono::Utc::now().timestamp())
    .fetch_optional(pool)
    .await
}

pub fn set_session_cookie(cookies: &Cookies, token: String) {
    let mut cookie = Cookie::new(SESSION_COOKIE_NAME, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookies.add(cookie);
}

pub fn clear_session_cookie(cookies: &Cookies) {
    // 必须设置相同的 path 才能正确删除 cookie
    let mut removal = Cookie::new(SESSION_COOKIE_NAME, "");
    removal.set_path("/");
    cookies.remove(removal);
}
