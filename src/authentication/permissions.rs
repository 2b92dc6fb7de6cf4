use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnCollections,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnCollections,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    /// Favorites, shopping cart and subscriptions
    ManageOwnCollections,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let user_role = &session.user_role;

        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if user_role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtSessionData;
    use rstest::rstest;

    #[rstest]
    #[case(UserRole::User, ActionType::CreateRecipes, true)]
    #[case(UserRole::User, ActionType::ManageOwnCollections, true)]
    #[case(UserRole::User, ActionType::ManageAllRecipes, false)]
    #[case(UserRole::User, ActionType::ManageTags, false)]
    #[case(UserRole::Admin, ActionType::ManageAllRecipes, true)]
    #[case(UserRole::Admin, ActionType::ManageIngredients, true)]
    fn role_table(#[case] role: UserRole, #[case] action: ActionType, #[case] allowed: bool) {
        let session: SessionData = JwtSessionData::new(1, String::from("user"), role).into();
        assert_eq!(action.authenticate(&session), allowed);
    }
}
