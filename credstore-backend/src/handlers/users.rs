use std::sync::Arc;

use axum::extract::Extension;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use credstore_db::users::{self as db_users, UsersRow};

use crate::{error::ApiError, state::AppState};

/// GET /cgi-bin/show_users.py
///
/// Admin-only HTML dump of the `users` table. Answers 404 when no admin
/// token is configured.
pub async fn show(Extension(state): Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return ApiError::not_found("user dump disabled").into_html_response();
    };
    let presented = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !credstore_auth::bearer_matches(presented, expected) {
        tracing::warn!("user dump requested without a valid admin token");
        return ApiError::Unauthorized.into_html_response();
    }

    match load_users(&state).await {
        Ok(rows) => {
            tracing::info!(count = rows.len(), "user dump served");
            Html(render_users_page(&rows)).into_response()
        }
        Err(e) => e.into_html_response(),
    }
}

async fn load_users(state: &AppState) -> Result<Vec<UsersRow>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;
    Ok(db_users::list_all(&mut *conn).await?)
}

pub fn render_users_page(rows: &[UsersRow]) -> String {
    let mut html = String::from(
        "<html><head><title>Registered users</title></head><body>\n<h1>Registered users</h1>\n",
    );
    if rows.is_empty() {
        html.push_str("<p>No registered users.</p>\n");
    } else {
        html.push_str("<table border='1'>\n<tr><th>Username</th><th>Password hash</th></tr>\n");
        for row in rows {
            html.push_str("<tr><td>");
            html.push_str(&html_escape::encode_text(&row.username));
            html.push_str("</td><td>");
            html.push_str(&html_escape::encode_text(&row.password_hash));
            html.push_str("</td></tr>\n");
        }
        html.push_str("</table>\n");
    }
    html.push_str("</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_empty_message() {
        let page = render_users_page(&[]);
        assert!(page.contains("<p>No registered users.</p>"));
        assert!(!page.contains("<table"));
    }

    #[test]
    fn escapes_cell_values() {
        let rows = vec![UsersRow {
            username: "<script>alert(1)</script>".into(),
            password_hash: "a&b".into(),
        }];
        let page = render_users_page(&rows);
        assert!(page.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(page.contains("a&amp;b"));
        assert!(!page.contains("<script>"));
    }
}
