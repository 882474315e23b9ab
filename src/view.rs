use crate::model::{Category, Movie};
use serde::Serialize;

pub const GRID_PAGE_SIZE: usize = 12;
pub const TABLE_PAGE_SIZE: usize = 10;

/// Category names of `movie` in its own order; unknown ids are dropped.
pub fn category_names(movie: &Movie, categories: &[Category]) -> Vec<String> {
    movie
        .category
        .iter()
        .filter_map(|id| categories.iter().find(|c| c.id == *id))
        .map(|c| c.name.clone())
        .collect()
}

pub fn poster_path(path: &str) -> String {
    if path.starts_with('/') || path.starts_with("http://") || path.starts_with("https://") {
        path.to_owned()
    } else {
        format!("/{}", path.trim_start_matches("./"))
    }
}

/// A movie with its category join resolved, ready for a template.
#[derive(Serialize, Debug)]
pub struct MovieView {
    #[serde(flatten)]
    pub movie: Movie,
    pub poster_path: String,
    pub banner_path: String,
    pub category_names: Vec<String>,
    pub actor_list: String,
    pub category_ids: String,
}

impl MovieView {
    pub fn new(movie: Movie, categories: &[Category]) -> Self {
        MovieView {
            poster_path: poster_path(&movie.poster),
            banner_path: poster_path(&movie.banner),
            category_names: category_names(&movie, categories),
            actor_list: movie.actors.join(", "),
            category_ids: movie
                .category
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            movie,
        }
    }

    pub fn list(movies: Vec<Movie>, categories: &[Category]) -> Vec<Self> {
        movies
            .into_iter()
            .map(|movie| MovieView::new(movie, categories))
            .collect()
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub pages: Vec<usize>,
}

impl Pagination {
    /// Pages are 1-based; out of range requests clamp into range.
    pub fn new(total_items: usize, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total_pages = (total_items + per_page - 1) / per_page;
        let page = page.max(1).min(total_pages.max(1));
        Pagination {
            page,
            per_page,
            total_items,
            total_pages,
            pages: (1..=total_pages).collect(),
        }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip((self.page - 1) * self.per_page)
            .take(self.per_page)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::movie;

    fn categories() -> Vec<Category> {
        vec![
            Category {
                id: 1,
                name: "X".to_owned(),
            },
            Category {
                id: 2,
                name: "Y".to_owned(),
            },
        ]
    }

    #[test]
    fn unresolved_categories_are_dropped() {
        let m = movie(1, "A", vec![2, 9, 1]);
        assert_eq!(category_names(&m, &categories()), vec!["Y", "X"]);
    }

    #[test]
    fn poster_paths() {
        assert_eq!(poster_path("images/a.jpg"), "/images/a.jpg");
        assert_eq!(poster_path("./images/a.jpg"), "/images/a.jpg");
        assert_eq!(poster_path("/images/a.jpg"), "/images/a.jpg");
        assert_eq!(poster_path("https://x/a.jpg"), "https://x/a.jpg");
    }

    #[test]
    fn view_flattens_movie() {
        let mut m = movie(3, "A", vec![1, 2]);
        m.actors = vec!["P".to_owned(), "Q".to_owned()];
        let view = serde_json::to_value(MovieView::new(m, &categories())).unwrap();
        assert_eq!(view["id"], 3);
        assert_eq!(view["title"], "A");
        assert_eq!(view["actor_list"], "P, Q");
        assert_eq!(view["category_ids"], "1, 2");
        assert_eq!(view["poster_path"], "/images/poster.jpg");
    }

    #[test]
    fn pagination() {
        let p = Pagination::new(25, 3, 10);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.pages, vec![1, 2, 3]);
        assert_eq!(p.slice((1..=25).collect()), vec![21, 22, 23, 24, 25]);

        let p = Pagination::new(25, 9, 10);
        assert_eq!(p.page, 3);

        let p = Pagination::new(0, 1, 10);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.page, 1);
        assert!(p.slice(Vec::<u32>::new()).is_empty());
    }
}
