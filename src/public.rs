use crate::database::Catalog;
use crate::fixtures::FixtureKind;
use crate::model::{parse_id, NewUser, SessionUser};
use crate::session::Session;
use crate::view::{MovieView, Pagination, GRID_PAGE_SIZE};
use crate::{log_error, page_context, redirect, render, Db, Tera};
use actix_identity::Identity;
use actix_web::{web, HttpResponse};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Deserialize, Debug, Default)]
pub struct IndexQuery {
    q: Option<String>,
    category: Option<String>,
    page: Option<String>,
}

pub async fn index<D: Catalog>(
    id: Identity,
    query: web::Query<IndexQuery>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    let keyword = query.q.as_deref().map(str::trim).unwrap_or("");
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "all");
    let movies = if !keyword.is_empty() {
        db.search_movies(keyword)
    } else if let Some(category) = category {
        match parse_id(category) {
            Some(category_id) => db.movies_by_category(category_id),
            None => Ok(Vec::new()),
        }
    } else {
        db.movies()
    }
    .map_err(|err| log_error(err, "Database error"))?;
    let categories = db
        .categories()
        .map_err(|err| log_error(err, "Database error"))?;

    let page = query
        .page
        .as_deref()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let pagination = Pagination::new(movies.len(), page, GRID_PAGE_SIZE);
    let movies = MovieView::list(pagination.slice(movies), &categories);

    let mut ctx = page_context(session.current_user());
    ctx.insert("movies", &movies);
    ctx.insert("categories", &categories);
    ctx.insert("pagination", &pagination);
    ctx.insert("q", keyword);
    ctx.insert("active_category", &category.unwrap_or("all"));
    render(&tera, "index.html", &ctx)
}

pub async fn movie_detail<D: Catalog>(
    id: Identity,
    path: web::Path<(String,)>,
    tera: Tera,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    let movie_id = match parse_id(&path.0) {
        Some(movie_id) => movie_id,
        None => return Ok(redirect("/")),
    };
    let movie = match db
        .movie_by_id(movie_id)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some(movie) => movie,
        None => return Ok(redirect("/")),
    };
    let categories = db
        .categories()
        .map_err(|err| log_error(err, "Database error"))?;
    let mut ctx = page_context(session.current_user());
    ctx.insert("movie", &MovieView::new(movie, &categories));
    render(&tera, "movie_detail.html", &ctx)
}

pub async fn login(
    id: Identity,
    flags: web::Query<HashMap<String, String>>,
    tera: Tera,
) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    let mut ctx = page_context(session.current_user());
    ctx.insert("failed", &flags.contains_key("failed"));
    ctx.insert("logged_out", &flags.contains_key("logout"));
    render(&tera, "login.html", &ctx)
}

#[derive(Serialize, Deserialize)]
pub struct LoginParams {
    email: String,
    password: String,
}

pub async fn login_post<D: Catalog>(
    params: web::Form<LoginParams>,
    id: Identity,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    if let Some(user) = db
        .login(&params.email, &params.password)
        .map_err(|err| log_error(err, "Database error"))?
    {
        let user = SessionUser::from(&user);
        session.login(&user);
        info!("{} logged in", user.username);
        let location = if user.is_admin() { "/admin" } else { "/" };
        return Ok(redirect(location));
    }
    Ok(redirect("/login?failed"))
}

pub async fn register(
    id: Identity,
    flags: web::Query<HashMap<String, String>>,
    tera: Tera,
) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    let mut ctx = page_context(session.current_user());
    ctx.insert("mismatch", &flags.contains_key("mismatch"));
    ctx.insert("taken", &flags.contains_key("taken"));
    render(&tera, "register.html", &ctx)
}

#[derive(Serialize, Deserialize)]
pub struct RegisterParams {
    username: String,
    email: String,
    password: String,
    confirm_password: String,
}

pub async fn register_post<D: Catalog>(
    params: web::Form<RegisterParams>,
    id: Identity,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let params = params.into_inner();
    if params.password != params.confirm_password {
        return Ok(redirect("/register?mismatch"));
    }
    let new_user = NewUser {
        username: params.username,
        email: params.email,
        password: params.password,
    };
    match db
        .register(new_user)
        .map_err(|err| log_error(err, "Database error"))?
    {
        Some(user) => {
            info!("Registered {} as user {}", user.username, user.id);
            Session::new(id).login(&SessionUser::from(&user));
            Ok(redirect("/"))
        }
        None => Ok(redirect("/register?taken")),
    }
}

pub async fn logout(id: Identity) -> actix_web::Result<HttpResponse> {
    let session = Session::new(id);
    if session.is_logged_in() {
        session.logout();
    }
    Ok(redirect("/login?logout"))
}

/// The raw fixture documents. Users are only handed to admins.
pub async fn fixture<D: Catalog>(
    id: Identity,
    path: web::Path<(String,)>,
    db: Db<D>,
) -> actix_web::Result<HttpResponse> {
    let is_admin = Session::new(id).is_admin();
    let body = match FixtureKind::from_name(&path.0) {
        Some(FixtureKind::Movies) => db.movies().map(|m| serde_json::to_string(&m)),
        Some(FixtureKind::Categories) => db.categories().map(|c| serde_json::to_string(&c)),
        Some(FixtureKind::Users) if is_admin => {
            db.users().map(|u| serde_json::to_string(&u))
        }
        _ => return Ok(HttpResponse::NotFound().finish()),
    }
    .map_err(|err| log_error(err, "Database error"))?
    .map_err(|err| log_error(err, "Serialization error"))?;
    Ok(HttpResponse::Ok()
        .content_type("application/json")
        .body(body))
}
