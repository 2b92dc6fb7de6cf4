//! Structural checks a recipe submission has to pass before anything is written.
//!
//! Rules are checked in a fixed order and the first failing rule rejects the whole
//! submission:
//!
//! 1. every ingredient amount is within bounds, and there is at least one ingredient
//! 2. there is at least one tag
//! 3. no tag is listed twice
//! 4. no ingredient is listed twice
//! 5. cooking time is within bounds

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    constants::{MAX_AMOUNT, MAX_COOKING_TIME, MIN_AMOUNT, MIN_COOKING_TIME},
    schema::{RecipePayload, Uuid},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error(
        "Ingredient {ingredient} needs an amount between {} and {}, got {amount}",
        MIN_AMOUNT,
        MAX_AMOUNT
    )]
    InvalidAmount { ingredient: Uuid, amount: i64 },

    #[error("A recipe needs at least one ingredient")]
    NoIngredients,

    #[error("A recipe needs at least one tag")]
    NoTags,

    #[error("Tag {0} is listed more than once")]
    DuplicateTag(Uuid),

    #[error("Ingredient {0} is listed more than once")]
    DuplicateIngredient(Uuid),

    #[error(
        "Cooking time must be between {} and {} minutes, got {0}",
        MIN_COOKING_TIME,
        MAX_COOKING_TIME
    )]
    InvalidCookingTime(i64),
}

/// A submission that passed every composition rule, narrowed to storage widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecipe {
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<(Uuid, i32)>,
}

pub fn validate_composition(payload: RecipePayload) -> Result<ValidatedRecipe, CompositionError> {
    let mut ingredients = Vec::with_capacity(payload.ingredients.len());
    for part in payload.ingredients.iter() {
        let amount = in_bounds(part.amount, MIN_AMOUNT, MAX_AMOUNT).ok_or(
            CompositionError::InvalidAmount {
                ingredient: part.id,
                amount: part.amount,
            },
        )?;
        ingredients.push((part.id, amount));
    }

    if ingredients.is_empty() {
        return Err(CompositionError::NoIngredients);
    }

    if payload.tags.is_empty() {
        return Err(CompositionError::NoTags);
    }

    if let Some(tag) = first_duplicate(payload.tags.iter().copied()) {
        return Err(CompositionError::DuplicateTag(tag));
    }

    if let Some(ingredient) = first_duplicate(ingredients.iter().map(|(id, _)| *id)) {
        return Err(CompositionError::DuplicateIngredient(ingredient));
    }

    let cooking_time = in_bounds(payload.cooking_time, MIN_COOKING_TIME, MAX_COOKING_TIME)
        .ok_or(CompositionError::InvalidCookingTime(payload.cooking_time))?;

    Ok(ValidatedRecipe {
        name: payload.name,
        image: payload.image,
        text: payload.text,
        cooking_time,
        tags: payload.tags,
        ingredients,
    })
}

fn in_bounds(value: i64, min: i64, max: i64) -> Option<i32> {
    if value < min || value > max {
        return None;
    }
    i32::try_from(value).ok()
}

fn first_duplicate(ids: impl Iterator<Item = Uuid>) -> Option<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IngredientAmount;
    use rstest::rstest;

    fn payload(tags: Vec<Uuid>, ingredients: Vec<(Uuid, i64)>, cooking_time: i64) -> RecipePayload {
        RecipePayload {
            name: String::from("Борщ"),
            image: String::from("recipes/images/borsch.png"),
            text: String::from("Варить до готовности"),
            cooking_time,
            tags,
            ingredients: ingredients
                .into_iter()
                .map(|(id, amount)| IngredientAmount { id, amount })
                .collect(),
        }
    }

    #[test]
    fn accepts_well_formed_recipe() {
        let recipe = validate_composition(payload(vec![1, 2], vec![(10, 5), (11, 200)], 45)).unwrap();

        assert_eq!(recipe.tags, vec![1, 2]);
        assert_eq!(recipe.ingredients, vec![(10, 5), (11, 200)]);
        assert_eq!(recipe.cooking_time, 45);
        assert_eq!(recipe.name, "Борщ");
    }

    #[rstest]
    #[case::no_ingredients(payload(vec![1], vec![], 10), CompositionError::NoIngredients)]
    #[case::no_tags(payload(vec![], vec![(1, 1)], 10), CompositionError::NoTags)]
    #[case::nothing_at_all(payload(vec![], vec![], 10), CompositionError::NoIngredients)]
    #[case::repeated_tag(payload(vec![1, 2, 1], vec![(1, 1)], 10), CompositionError::DuplicateTag(1))]
    #[case::repeated_ingredient(
        payload(vec![1], vec![(4, 1), (5, 2), (4, 3)], 10),
        CompositionError::DuplicateIngredient(4)
    )]
    #[case::zero_amount(
        payload(vec![1], vec![(4, 1), (5, 0)], 10),
        CompositionError::InvalidAmount { ingredient: 5, amount: 0 }
    )]
    #[case::negative_amount(
        payload(vec![1], vec![(4, -3)], 10),
        CompositionError::InvalidAmount { ingredient: 4, amount: -3 }
    )]
    #[case::oversized_amount(
        payload(vec![1], vec![(4, MAX_AMOUNT + 1)], 10),
        CompositionError::InvalidAmount { ingredient: 4, amount: MAX_AMOUNT + 1 }
    )]
    #[case::zero_cooking_time(payload(vec![1], vec![(4, 1)], 0), CompositionError::InvalidCookingTime(0))]
    #[case::oversized_cooking_time(
        payload(vec![1], vec![(4, 1)], MAX_COOKING_TIME + 1),
        CompositionError::InvalidCookingTime(MAX_COOKING_TIME + 1)
    )]
    fn rejects_malformed_recipe(#[case] payload: RecipePayload, #[case] expected: CompositionError) {
        assert_eq!(validate_composition(payload), Err(expected));
    }

    #[test]
    fn amounts_are_checked_before_empty_tags() {
        let result = validate_composition(payload(vec![], vec![(4, 0)], 0));
        assert_eq!(
            result,
            Err(CompositionError::InvalidAmount {
                ingredient: 4,
                amount: 0
            })
        );
    }

    #[test]
    fn duplicates_are_checked_before_cooking_time() {
        let result = validate_composition(payload(vec![3, 3], vec![(4, 1)], 0));
        assert_eq!(result, Err(CompositionError::DuplicateTag(3)));
    }

    #[test]
    fn boundary_values_pass() {
        let recipe =
            validate_composition(payload(vec![1], vec![(4, MIN_AMOUNT)], MIN_COOKING_TIME)).unwrap();
        assert_eq!(recipe.ingredients, vec![(4, 1)]);
        assert_eq!(recipe.cooking_time, 1);

        let recipe =
            validate_composition(payload(vec![1], vec![(4, MAX_AMOUNT)], MAX_COOKING_TIME)).unwrap();
        assert_eq!(recipe.ingredients, vec![(4, i32::MAX)]);
        assert_eq!(recipe.cooking_time, i16::MAX as i32);
    }
}
