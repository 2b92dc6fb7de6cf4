use std::{collections::HashMap, str::FromStr};

use super::error::FoodgramError;
use crate::constants::FILTER_ENABLED_VALUE;

pub type FormData = Vec<(String, String)>;

/// Query string values, keeping every value of repeated keys (`?tags=a&tags=b`).
pub struct Form {
    inner: HashMap<String, Vec<String>>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        let mut inner: HashMap<String, Vec<String>> = HashMap::new();
        data.into_iter()
            .for_each(|(key, value)| inner.entry(key).or_default().push(value));

        Self { inner }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.inner
            .get(key)
            .and_then(|values| values.first())
            .map(|value| value.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<String> {
        self.inner.get(key).cloned().unwrap_or_default()
    }

    pub fn get_number<T>(&self, key: &str) -> Result<Option<T>, FoodgramError>
    where
        T: FromStr,
    {
        match self.get_str(key) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_e| FoodgramError::InvalidQuery(format!("{key} must be a number"))),
            None => Ok(None),
        }
    }

    /// Flags are on only for the numeric value 1. Anything else, even text that is not a
    /// number, leaves the flag off rather than rejecting the request.
    pub fn get_flag(&self, key: &str) -> bool {
        self.get_str(key)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .map(|value| value == FILTER_ENABLED_VALUE)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[rstest]
    #[case("1", true)]
    #[case("1.0", true)]
    #[case(" 1 ", true)]
    #[case("0", false)]
    #[case("2", false)]
    #[case("-1", false)]
    #[case("true", false)]
    #[case("", false)]
    fn flag_only_for_one(#[case] value: &str, #[case] expected: bool) {
        assert_eq!(form(&[("is_favorited", value)]).get_flag("is_favorited"), expected);
    }

    #[test]
    fn missing_flag_is_off() {
        assert!(!form(&[]).get_flag("is_in_shopping_cart"));
    }

    #[test]
    fn repeated_keys_are_kept() {
        let form = form(&[("tags", "breakfast"), ("author", "3"), ("tags", "dinner")]);

        assert_eq!(form.get_all("tags"), vec!["breakfast", "dinner"]);
        assert_eq!(form.get_str("tags"), Some("breakfast"));
        assert!(form.get_all("name").is_empty());
    }

    #[test]
    fn numbers_parse_or_reject() {
        let form = form(&[("author", "3"), ("recipes_limit", "many")]);

        assert_eq!(form.get_number::<i32>("author").unwrap(), Some(3));
        assert_eq!(form.get_number::<i32>("missing").unwrap(), None);
        assert!(matches!(
            form.get_number::<i64>("recipes_limit"),
            Err(FoodgramError::InvalidQuery(_))
        ));
    }
}
