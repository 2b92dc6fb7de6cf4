use std::collections::BTreeMap;

use serde::Serialize;

use crate::{constants::SHOPPING_LIST_HEADER, schema::CartIngredient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Sums cart ingredients per (name, unit). Units are opaque labels, so the same name in
/// two units yields two lines. Lines come out ordered by name, then unit.
pub fn aggregate_cart<I>(parts: I) -> Vec<ShoppingListLine>
where
    I: IntoIterator<Item = CartIngredient>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.name, part.measurement_unit))
            .or_insert(0) += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| ShoppingListLine {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    let body = lines
        .iter()
        .map(|line| format!("{} - {},{}", line.name, line.total, line.measurement_unit))
        .collect::<Vec<String>>()
        .join("\n");

    format!("{SHOPPING_LIST_HEADER}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, unit: &str, amount: i32) -> CartIngredient {
        CartIngredient {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn shared_ingredient_is_summed() {
        let parts = vec![
            part("Salt", "g", 5),
            part("Flour", "g", 500),
            part("Salt", "g", 10),
            part("Milk", "ml", 250),
        ];

        let lines = aggregate_cart(parts);
        let text = render_shopping_list(&lines);
        let body: Vec<&str> = text
            .strip_prefix(SHOPPING_LIST_HEADER)
            .unwrap()
            .split('\n')
            .collect();

        assert!(body.contains(&"Salt - 15,g"));
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn same_name_in_different_units_stays_apart() {
        let lines = aggregate_cart(vec![
            part("Sugar", "g", 100),
            part("Sugar", "tbsp", 2),
            part("Sugar", "g", 50),
        ]);

        assert_eq!(
            lines,
            vec![
                ShoppingListLine {
                    name: String::from("Sugar"),
                    measurement_unit: String::from("g"),
                    total: 150
                },
                ShoppingListLine {
                    name: String::from("Sugar"),
                    measurement_unit: String::from("tbsp"),
                    total: 2
                },
            ]
        );
    }

    #[test]
    fn lines_are_sorted_by_name_case_sensitively() {
        let lines = aggregate_cart(vec![
            part("яйца", "шт", 2),
            part("apple", "шт", 1),
            part("Банан", "шт", 3),
            part("Apple", "шт", 4),
        ]);
        let names: Vec<&str> = lines.iter().map(|line| line.name.as_str()).collect();

        assert_eq!(names, vec!["Apple", "apple", "Банан", "яйца"]);
    }

    #[test]
    fn renders_header_and_lines() {
        let lines = aggregate_cart(vec![part("Картофель", "г", 300), part("Лук", "г", 50)]);

        assert_eq!(
            render_shopping_list(&lines),
            "Список покупок с сайта Foodgram:\n\nКартофель - 300,г\nЛук - 50,г"
        );
    }

    #[test]
    fn empty_cart_is_just_the_header() {
        let lines = aggregate_cart(Vec::new());

        assert!(lines.is_empty());
        assert_eq!(render_shopping_list(&lines), SHOPPING_LIST_HEADER);
    }

    #[test]
    fn totals_do_not_overflow_storage_width() {
        let lines = aggregate_cart(vec![part("Water", "ml", i32::MAX), part("Water", "ml", i32::MAX)]);

        assert_eq!(lines[0].total, 2 * i64::from(i32::MAX));
    }
}
