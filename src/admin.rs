use crate::database::Catalog;
use crate::editor::{transition, EditorEvent, EditorState, Flash, MovieForm};
use crate::export::{parse_import, ExportFormat};
use crate::fixtures::{FixtureKind, PageDepth};
use crate::model::{parse_id, SessionUser};
use crate::session::Session;
use crate::view::{MovieView, Pagination, TABLE_PAGE_SIZE};
use crate::{log_error, page_context, redirect, render, Db, Tera};
use actix_identity::Identity;
use actix_multipart::{Multipart, MultipartError};
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use log::{debug, info};
use std::collections::HashMap;

const FLASH_FLAGS: &[&str] = &["saved", "deleted", "missing", "imported", "import_failed"];

fn require_admin(id: Identity) -> Option<SessionUser> {
    Session::new(id).current_user().filter(SessionUser::is_admin)
}

fn movies_location(flash: Option<Flash>) -> String {
    match flash {
        Some(flash) => format!("/admin/movies?{}", flash.query_flag()),
        None => "/admin/movies".to_owned(),
    }
}

fn render_editor<D: Catalog>(
    tera: &tera::Tera,
    db: &D,
    user: SessionUser,
    state: EditorState,
    flash: Option<Flash>,
) -> actix_web::Result<HttpResponse> {
    let mut ctx = page_context(Some(user));
    let (template, form, error) = match state {
        EditorState::Idle => return Ok(redirect(&movies_location(flash))),
        EditorState::ConfirmingDelete(movie) => {
            let categories = db
                .categories()
                .map_err(|err| log_error(err, "Database error"))?;
            ctx.insert("movie", &MovieView::new(movie, &categories));
            return render(tera, "admin/confirm_delete.html", &ctx);
        }
        EditorState::CreatingNew { form, error } => ("New movie", form, error),
        EditorState::EditingExisting { form, error } => ("Edit movie", form, error),
    };
    let categories = db
        .categories()
        .map_err(|err| log_error(err, "Database error"))?;
    ctx.insert("heading", template);
    ctx.insert("form", &form);
    ctx.insert("error", &error);
    ctx.insert("categories", &categories);
    render(tera, "admin/movie_form.html", &ctx)
}

pub async fn dashboard<D: Catalog>(
    req: HttpRequest,
    id: Identity,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let stats: HashMap<&str, usize> = vec![
        (
            "movies",
            db.movies()
                .map_err(|err| log_error(err, "Database error"))?
                .len(),
        ),
        (
            "users",
            db.users()
                .map_err(|err| log_error(err, "Database error"))?
                .len(),
        ),
        (
            "categories",
            db.categories()
                .map_err(|err| log_error(err, "Database error"))?
                .len(),
        ),
    ]
    .into_iter()
    .collect();
    let depth = PageDepth::from_path(req.path());
    let fixtures: Vec<(&str, String)> = FixtureKind::ALL
        .iter()
        .map(|kind| (kind.name(), kind.relative_path(depth)))
        .collect();
    let mut ctx = page_context(Some(user));
    ctx.insert("stats", &stats);
    ctx.insert("fixtures", &fixtures);
    render(&tera, "admin/index.html", &ctx)
}

pub async fn movies<D: Catalog>(
    id: Identity,
    query: web::Query<HashMap<String, String>>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let keyword = query.get("q").map(|q| q.trim()).unwrap_or("");
    let movies = db
        .search_movies(keyword)
        .map_err(|err| log_error(err, "Database error"))?;
    let categories = db
        .categories()
        .map_err(|err| log_error(err, "Database error"))?;
    let page = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let pagination = Pagination::new(movies.len(), page, TABLE_PAGE_SIZE);
    let movies = MovieView::list(pagination.slice(movies), &categories);

    let mut ctx = page_context(Some(user));
    ctx.insert("movies", &movies);
    ctx.insert("pagination", &pagination);
    ctx.insert("q", keyword);
    ctx.insert(
        "flash",
        &FLASH_FLAGS.iter().find(|flag| query.contains_key(**flag)),
    );
    render(&tera, "admin/movies.html", &ctx)
}

pub async fn new_movie<D: Catalog>(
    id: Identity,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let (state, flash) = transition(EditorState::Idle, EditorEvent::New, db.get_ref())
        .map_err(|err| log_error(err, "Database error"))?;
    render_editor(&tera, db.get_ref(), user, state, flash)
}

pub async fn edit_movie<D: Catalog>(
    id: Identity,
    path: web::Path<(String,)>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let movie_id = match parse_id(&path.0) {
        Some(movie_id) => movie_id,
        None => return Ok(redirect(&movies_location(Some(Flash::Missing)))),
    };
    let (state, flash) = transition(EditorState::Idle, EditorEvent::Edit(movie_id), db.get_ref())
        .map_err(|err| log_error(err, "Database error"))?;
    render_editor(&tera, db.get_ref(), user, state, flash)
}

pub async fn save_movie<D: Catalog>(
    id: Identity,
    form: web::Form<MovieForm>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let form = form.into_inner();
    let state = EditorState::for_form(form.clone());
    let (state, flash) = transition(state, EditorEvent::Submit(form), db.get_ref())
        .map_err(|err| log_error(err, "Database error"))?;
    render_editor(&tera, db.get_ref(), user, state, flash)
}

pub async fn confirm_delete<D: Catalog>(
    id: Identity,
    path: web::Path<(String,)>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let user = match require_admin(id) {
        Some(user) => user,
        None => return Ok(redirect("/login")),
    };
    let movie_id = match parse_id(&path.0) {
        Some(movie_id) => movie_id,
        None => return Ok(redirect(&movies_location(Some(Flash::Missing)))),
    };
    let (state, flash) = transition(EditorState::Idle, EditorEvent::Delete(movie_id), db.get_ref())
        .map_err(|err| log_error(err, "Database error"))?;
    render_editor(&tera, db.get_ref(), user, state, flash)
}

pub async fn delete_movie<D: Catalog>(
    id: Identity,
    path: web::Path<(String,)>,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    if require_admin(id).is_none() {
        return Ok(redirect("/login"));
    }
    let movie_id = match parse_id(&path.0) {
        Some(movie_id) => movie_id,
        None => return Ok(redirect(&movies_location(Some(Flash::Missing)))),
    };
    let (state, flash) = transition(EditorState::Idle, EditorEvent::Delete(movie_id), db.get_ref())
        .and_then(|(state, flash)| match state {
            EditorState::ConfirmingDelete(_) => {
                transition(state, EditorEvent::Confirm, db.get_ref())
            }
            other => Ok((other, flash)),
        })
        .map_err(|err| log_error(err, "Database error"))?;
    debug!("Delete of movie {} ended in {:?}", movie_id, state);
    Ok(redirect(&movies_location(flash)))
}

pub async fn export<D: Catalog>(
    id: Identity,
    path: web::Path<(String, String)>,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    if require_admin(id).is_none() {
        return Ok(redirect("/login"));
    }
    let (kind, format) = path.into_inner();
    let (kind, format) = match (
        FixtureKind::from_name(&kind),
        ExportFormat::from_extension(&format),
    ) {
        (Some(kind), Some(format)) => (kind, format),
        _ => return Ok(HttpResponse::NotFound().finish()),
    };
    let document = match kind {
        FixtureKind::Movies => db.movies().and_then(|m| format.render(&m)),
        FixtureKind::Categories => db.categories().and_then(|c| format.render(&c)),
        FixtureKind::Users => db.users().and_then(|u| format.render(&u)),
    }
    .map_err(|err| log_error(err, "Export error"))?;
    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            "content-disposition",
            format!(
                "attachment; filename=\"{}.{}\"",
                kind.name(),
                format.extension()
            ),
        ))
        .body(document))
}

/// Contents of the first file in a multipart upload.
async fn read_upload(mut payload: Multipart) -> Result<Vec<u8>, MultipartError> {
    let mut document = Vec::new();
    if let Some(mut field) = payload.try_next().await? {
        while let Some(chunk) = field.try_next().await? {
            document.extend_from_slice(&chunk);
        }
    }
    Ok(document)
}

/// Replace the movie list with an uploaded JSON document.
pub async fn import_movies<D: Catalog>(
    id: Identity,
    payload: Multipart,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    if require_admin(id).is_none() {
        return Ok(redirect("/login"));
    }
    let movies = match read_upload(payload).await {
        Ok(document) => parse_import(&String::from_utf8_lossy(&document)),
        Err(err) => {
            debug!("Unreadable upload: {:?}", err);
            return Ok(redirect("/admin/movies?import_failed"));
        }
    };
    let movies = match movies {
        Ok(movies) => movies,
        Err(err) => {
            debug!("Rejected import: {:?}", err);
            return Ok(redirect("/admin/movies?import_failed"));
        }
    };
    info!("Importing {} movies", movies.len());
    db.replace_movies(movies)
        .map_err(|err| log_error(err, "Database error"))?;
    Ok(redirect("/admin/movies?imported"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureStore;
    use crate::public::tests::{body_text, location, store};
    use actix_web::{cookie::Cookie, test, App};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .wrap(crate::identity_service(&[0; 32]))
                    .app_data(web::Data::new(crate::templates().unwrap()))
                    .app_data(web::Data::new(store()))
                    .configure(crate::routes::<FixtureStore>),
            )
            .await
        };
    }

    macro_rules! login {
        ($app:expr, $email:expr, $password:expr) => {{
            let req = test::TestRequest::post()
                .uri("/login")
                .set_form(&[("email", $email), ("password", $password)])
                .to_request();
            let resp = test::call_service(&$app, req).await;
            let cookie: Cookie<'static> = resp
                .response()
                .cookies()
                .find(|c| c.name() == "auth-cookie")
                .unwrap()
                .into_owned();
            cookie
        }};
    }

    #[actix_rt::test]
    async fn requires_admin() {
        let app = app!();
        let req = test::TestRequest::get().uri("/admin/movies").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login");

        let cookie = login!(app, "viewer@example.com", "viewer123");
        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login");
    }

    #[actix_rt::test]
    async fn dashboard_and_table() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");
        let req = test::TestRequest::get()
            .uri("/admin")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::get()
            .uri("/admin/movies?q=b")
            .cookie(cookie)
            .to_request();
        let body = body_text(test::call_and_read_body(&app, req).await);
        assert!(body.contains("/admin/movies/2/edit"));
        assert!(!body.contains("/admin/movies/1/edit"));
    }

    #[actix_rt::test]
    async fn create_edit_delete() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");

        let req = test::TestRequest::post()
            .uri("/admin/movies")
            .cookie(cookie.clone())
            .set_form(&MovieForm {
                title: "Brand New".to_owned(),
                category: "1".to_owned(),
                duration: "90".to_owned(),
                rating: "6.5".to_owned(),
                ..MovieForm::default()
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?saved");

        let req = test::TestRequest::get()
            .uri("/admin/movies/3/edit")
            .cookie(cookie.clone())
            .to_request();
        let body = body_text(test::call_and_read_body(&app, req).await);
        assert!(body.contains("Brand New"));

        let req = test::TestRequest::post()
            .uri("/admin/movies/3/delete")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?deleted");

        let req = test::TestRequest::post()
            .uri("/admin/movies/3/delete")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?missing");
    }

    #[actix_rt::test]
    async fn invalid_form_is_rendered_again() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");
        let req = test::TestRequest::post()
            .uri("/admin/movies")
            .cookie(cookie)
            .set_form(&MovieForm {
                title: "Broken".to_owned(),
                duration: "ninety".to_owned(),
                rating: "6.5".to_owned(),
                ..MovieForm::default()
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body = body_text(test::read_body(resp).await);
        assert!(body.contains("invalid duration"));
    }

    #[actix_rt::test]
    async fn exports_csv() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");
        let req = test::TestRequest::get()
            .uri("/admin/export/categories.csv")
            .cookie(cookie)
            .to_request();
        let body = body_text(test::call_and_read_body(&app, req).await);
        assert_eq!(body, "id,name\r\n1,X\r\n2,Y\r\n");
    }

    const BOUNDARY: &str = "moviecat-upload";

    fn upload(document: &str) -> (String, String) {
        (
            format!("multipart/form-data; boundary={}", BOUNDARY),
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"movies.json\"\r\n\
                 Content-Type: application/json\r\n\r\n{doc}\r\n--{b}--\r\n",
                b = BOUNDARY,
                doc = document
            ),
        )
    }

    #[actix_rt::test]
    async fn movies_page_offers_upload_form() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");
        let req = test::TestRequest::get()
            .uri("/admin/movies")
            .cookie(cookie)
            .to_request();
        let body = body_text(test::call_and_read_body(&app, req).await);
        assert!(body.contains("action=\"/admin/import/movies\""));
        assert!(body.contains("multipart/form-data"));
        assert!(body.contains("type=\"file\""));
    }

    #[actix_rt::test]
    async fn import_replaces_or_reports() {
        let app = app!();
        let cookie = login!(app, "admin@example.com", "admin123");
        let (content_type, body) = upload("not json");
        let req = test::TestRequest::post()
            .uri("/admin/import/movies")
            .cookie(cookie.clone())
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?import_failed");

        let req = test::TestRequest::post()
            .uri("/admin/import/movies")
            .cookie(cookie.clone())
            .set_payload("[]")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?import_failed");

        let movies = vec![crate::model::tests::movie(7, "Imported", vec![])];
        let (content_type, body) = upload(&serde_json::to_string(&movies).unwrap());
        let req = test::TestRequest::post()
            .uri("/admin/import/movies")
            .cookie(cookie.clone())
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/admin/movies?imported");

        let req = test::TestRequest::get()
            .uri("/admin/movies")
            .cookie(cookie)
            .to_request();
        let body = body_text(test::call_and_read_body(&app, req).await);
        assert!(body.contains("/admin/movies/7/edit"));
        assert!(!body.contains("/admin/movies/1/edit"));
    }
}
