//! Local checks run before anything reaches the network.

use super::category::{Category, CategoryCreate, CategoryInfo, MAX_LEVEL};
use crate::error::ValidationError;

pub const MAX_NAME_LEN: usize = 100;

/// Characters the server stores in file names and CSV cells, so never in a category name.
pub const FORBIDDEN_CHARS: &[char] = &['<', '>', '"', '/', '\\', '|', '?', '*'];

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            len,
            max: MAX_NAME_LEN,
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control())
    {
        return Err(ValidationError::ForbiddenCharacter(c));
    }
    Ok(())
}

/// Validate a creation form against the categories known locally.
pub fn validate_create(draft: &CategoryCreate, known: &[Category]) -> Result<(), ValidationError> {
    validate_name(&draft.name)?;

    if !(1..=MAX_LEVEL).contains(&draft.level) {
        return Err(ValidationError::InvalidLevel(draft.level));
    }

    let parent = draft.parent.as_deref().map(str::trim).filter(|p| !p.is_empty());
    match (draft.level, parent) {
        (1, Some(_)) => return Err(ValidationError::UnexpectedParent),
        (1, None) => {}
        (level, None) => return Err(ValidationError::MissingParent { level }),
        (level, Some(parent)) => {
            if let Some(p) = known.iter().find(|c| c.id == parent) {
                if p.level + 1 != level {
                    return Err(ValidationError::ParentLevelMismatch {
                        parent: parent.to_string(),
                        parent_level: p.level,
                        level,
                    });
                }
            }
        }
    }

    let name = draft.trimmed_name();
    if let Some(existing) = known
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name) || c.id.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::DuplicateName(existing.name.clone()));
    }
    Ok(())
}

/// A category with children cannot be deleted; the children go first.
pub fn validate_delete(info: &CategoryInfo) -> Result<(), ValidationError> {
    if info.has_children() {
        return Err(ValidationError::HasChildren {
            category: info.name.clone(),
            children: info.child_categories.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<Category> {
        vec![
            Category::new("Shoes", "Shoes", 1, None),
            Category::new("Trail", "Trail", 2, Some("Shoes")),
        ]
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_name("   "), Err(ValidationError::EmptyName));
        assert_eq!(
            validate_name(&"x".repeat(101)),
            Err(ValidationError::NameTooLong { len: 101, max: 100 })
        );
        assert!(validate_name(&"x".repeat(100)).is_ok());
        assert_eq!(
            validate_name("Shoes/Boots"),
            Err(ValidationError::ForbiddenCharacter('/'))
        );
        assert_eq!(
            validate_name("Tab\there"),
            Err(ValidationError::ForbiddenCharacter('\t'))
        );
        assert!(validate_name("Shoes & Boots").is_ok());
    }

    #[test]
    fn test_level_and_parent_rules() {
        let known = known();
        assert_eq!(
            validate_create(&CategoryCreate::child("Boots", 2, ""), &known),
            Err(ValidationError::MissingParent { level: 2 })
        );
        assert_eq!(
            validate_create(&CategoryCreate::child("Boots", 1, "Shoes"), &known),
            Err(ValidationError::UnexpectedParent)
        );
        assert_eq!(
            validate_create(
                &CategoryCreate {
                    name: "Boots".into(),
                    level: 4,
                    parent: None
                },
                &known
            ),
            Err(ValidationError::InvalidLevel(4))
        );
        assert_eq!(
            validate_create(&CategoryCreate::child("Boots", 3, "Shoes"), &known),
            Err(ValidationError::ParentLevelMismatch {
                parent: "Shoes".into(),
                parent_level: 1,
                level: 3
            })
        );
        assert!(validate_create(&CategoryCreate::child("Boots", 2, "Shoes"), &known).is_ok());
        assert!(validate_create(&CategoryCreate::child("Fell", 3, "Trail"), &known).is_ok());
    }

    #[test]
    fn test_duplicate_names_ignore_case() {
        assert_eq!(
            validate_create(&CategoryCreate::root("  shoes "), &known()),
            Err(ValidationError::DuplicateName("Shoes".into()))
        );
    }

    #[test]
    fn test_delete_refuses_parents() {
        let info = CategoryInfo {
            name: "Shoes".into(),
            level: 1,
            parent: None,
            product_count: 3,
            child_count: 1,
            child_categories: vec!["Trail".into()],
        };
        assert_eq!(
            validate_delete(&info),
            Err(ValidationError::HasChildren {
                category: "Shoes".into(),
                children: vec!["Trail".into()]
            })
        );
    }
}
