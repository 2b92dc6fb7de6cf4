use sqlx::{Postgres, QueryBuilder};

use super::{
    error::FoodgramError,
    form::Form,
    schema::{MembershipKind, Uuid},
};

/// Recipe list filters as sent by the client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Tag slugs; a recipe matches when it carries any of them.
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, FoodgramError> {
        Ok(Self {
            tags: form.get_all("tags"),
            author: form.get_number("author")?,
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
        })
    }

    /// Appends `AND ...` conditions on the recipe alias `r`.
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Uuid>) {
        if !self.tags.is_empty() {
            builder.push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            );
            builder.push_bind(self.tags.clone());
            builder.push("))");
        }

        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ");
            builder.push_bind(author);
        }

        let collections = [
            (self.is_favorited, MembershipKind::Favorite),
            (self.is_in_shopping_cart, MembershipKind::ShoppingCart),
        ];

        for (kind, collection) in collections
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .filter_map(|(_, kind)| kind.collection().map(|collection| (kind, collection)))
        {
            match viewer {
                Some(viewer) => {
                    log::trace!("> Filtering recipes by {}", kind.label());
                    builder.push(
                        " AND EXISTS (SELECT 1 FROM recipe_memberships m WHERE m.recipe_id = r.id AND m.user_id = ",
                    );
                    builder.push_bind(viewer);
                    builder.push(" AND m.collection = ");
                    builder.push_bind(collection);
                    builder.push(")");
                }
                // Anonymous viewers have no collections
                None => {
                    builder.push(" AND FALSE");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn sql(filter: &RecipeFilter, viewer: Option<Uuid>) -> String {
        let mut builder = QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");
        filter.push_conditions(&mut builder, viewer);
        builder.sql().to_string()
    }

    #[test]
    fn parses_every_filter() {
        let filter = RecipeFilter::from_form(&form(&[
            ("tags", "breakfast"),
            ("tags", "lunch"),
            ("author", "4"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "0"),
        ]))
        .unwrap();

        assert_eq!(
            filter,
            RecipeFilter {
                tags: vec![String::from("breakfast"), String::from("lunch")],
                author: Some(4),
                is_favorited: true,
                is_in_shopping_cart: false,
            }
        );
    }

    #[test]
    fn malformed_author_is_rejected() {
        let result = RecipeFilter::from_form(&form(&[("author", "me")]));
        assert!(matches!(result, Err(FoodgramError::InvalidQuery(_))));
    }

    #[test]
    fn empty_filter_adds_nothing() {
        assert_eq!(
            sql(&RecipeFilter::default(), Some(1)),
            "SELECT r.* FROM recipes r WHERE TRUE"
        );
    }

    #[test]
    fn disabled_flags_pass_through() {
        let filter =
            RecipeFilter::from_form(&form(&[("is_favorited", "0"), ("is_in_shopping_cart", "yes")]))
                .unwrap();

        assert_eq!(sql(&filter, Some(1)), "SELECT r.* FROM recipes r WHERE TRUE");
    }

    #[test]
    fn favorited_flag_scopes_to_viewer() {
        let filter = RecipeFilter {
            is_favorited: true,
            ..Default::default()
        };

        let query = sql(&filter, Some(7));
        assert!(query.contains("FROM recipe_memberships m"));
        assert!(query.contains("m.user_id = $1 AND m.collection = $2"));
    }

    #[test]
    fn flags_match_nothing_for_anonymous_viewer() {
        let filter = RecipeFilter {
            is_in_shopping_cart: true,
            ..Default::default()
        };

        assert_eq!(
            sql(&filter, None),
            "SELECT r.* FROM recipes r WHERE TRUE AND FALSE"
        );
    }

    #[test]
    fn binds_are_numbered_in_order() {
        let filter = RecipeFilter {
            tags: vec![String::from("dinner")],
            author: Some(2),
            is_favorited: true,
            is_in_shopping_cart: true,
        };

        let query = sql(&filter, Some(3));
        assert!(query.contains("t.slug = ANY($1)"));
        assert!(query.contains("r.author_id = $2"));
        assert!(query.contains("m.user_id = $3 AND m.collection = $4"));
        assert!(query.contains("m.user_id = $5 AND m.collection = $6"));
    }
}
