//! Create-user form: field validation and committing a new [`User`].
//!
//! Both checks run every rule and report every violation, so the caller can
//! show the full list at once instead of one problem per attempt.

use crate::events::Channel;
use crate::model::User;
use crate::store::{PersistHandle, UserStore};

pub const USERNAME_REQUIRED_ERROR: &str = "Username is required.";
pub const PASSWORD_REQUIRED_ERROR: &str = "Password is required.";
pub const EMAIL_REQUIRED_ERROR: &str = "Email address is required.";

pub const PASSWORD_LENGTH_ERROR: &str = "Password must be between 5 and 12 characters long.";
pub const PASSWORD_ALPHANUMERIC_ERROR: &str = "Password must contain only letters and digits.";
pub const PASSWORD_LETTER_DIGIT_ERROR: &str =
    "Password must contain at least one letter and one digit.";
pub const PASSWORD_REPEATED_SEQUENCE_ERROR: &str =
    "Password must not contain a sequence of characters immediately followed by the same sequence.";

pub const PASSWORD_MIN_LEN: usize = 5;
pub const PASSWORD_MAX_LEN: usize = 12;

/// Check `password` against every password rule.
pub fn password_errors(password: &str) -> Vec<String> {
    let chars: Vec<char> = password.chars().collect();
    let mut errors = Vec::new();

    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&chars.len()) {
        errors.push(PASSWORD_LENGTH_ERROR.to_string());
    }
    if !chars.iter().all(char::is_ascii_alphanumeric) {
        errors.push(PASSWORD_ALPHANUMERIC_ERROR.to_string());
    }
    let has_letter = chars.iter().any(char::is_ascii_alphabetic);
    let has_digit = chars.iter().any(char::is_ascii_digit);
    if !(has_letter && has_digit) {
        errors.push(PASSWORD_LETTER_DIGIT_ERROR.to_string());
    }
    if has_adjacent_repeat(&chars) {
        errors.push(PASSWORD_REPEATED_SEQUENCE_ERROR.to_string());
    }
    errors
}

/// True if some run of two or more characters is immediately followed by itself.
fn has_adjacent_repeat(chars: &[char]) -> bool {
    let n = chars.len();
    (2..=n / 2).any(|len| (0..=n - 2 * len).any(|i| chars[i..i + len] == chars[i + len..i + 2 * len]))
}

/// Form state for creating a user, bound to the store it commits into.
pub struct CreateUserForm<'s> {
    pub username: String,
    pub password: String,
    pub email: String,
    pub is_admin: bool,
    store: &'s mut UserStore,
    errors: Channel<Vec<String>>,
    saved: Channel<()>,
    pending_persist: Option<PersistHandle>,
}

impl<'s> CreateUserForm<'s> {
    pub fn new(store: &'s mut UserStore) -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            email: String::new(),
            is_admin: false,
            store,
            errors: Channel::new(),
            saved: Channel::new(),
            pending_persist: None,
        }
    }

    pub fn store(&self) -> &UserStore {
        &*self.store
    }

    /// Error batches from rejected saves.
    pub fn errors(&self) -> &Channel<Vec<String>> {
        &self.errors
    }

    /// Fires once per successful save.
    pub fn saved(&self) -> &Channel<()> {
        &self.saved
    }

    pub fn validate_required_fields(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.username.is_empty() {
            errors.push(USERNAME_REQUIRED_ERROR.to_string());
        }
        if self.password.is_empty() {
            errors.push(PASSWORD_REQUIRED_ERROR.to_string());
        }
        if self.email.is_empty() {
            errors.push(EMAIL_REQUIRED_ERROR.to_string());
        }
        errors
    }

    pub fn validate_password(&self) -> Vec<String> {
        password_errors(&self.password)
    }

    pub fn can_save(&self) -> bool {
        self.validate_required_fields().is_empty() && self.validate_password().is_empty()
    }

    /// Validate and, if everything passes, add a new user to the store.
    ///
    /// Publishes exactly one error batch or one save signal. Returns the new
    /// user's id on success. Field values are left as they are.
    pub fn save(&mut self, persist: bool) -> Option<String> {
        let mut errors = self.validate_required_fields();
        errors.extend(self.validate_password());
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "create user rejected");
            self.errors.publish(&errors);
            return None;
        }

        let user = User::new(
            self.username.clone(),
            self.password.clone(),
            self.email.clone(),
            self.is_admin,
        );
        let id = user.user_id.clone();
        self.store.add(user);
        tracing::info!(user_id = %id, username = %self.username, "user created");
        if persist {
            self.pending_persist = Some(self.store.persist());
        }
        self.saved.publish(&());
        Some(id)
    }

    /// The background write started by the last persisting save, if any.
    pub fn take_pending_persist(&mut self) -> Option<PersistHandle> {
        self.pending_persist.take()
    }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sys::MemorySettings;
	use std::cell::{Cell, RefCell};
	use std::rc::Rc;
	use std::sync::Arc;

	fn store() -> UserStore {
		UserStore::new(Arc::new(MemorySettings::new()))
	}

	fn fill(form: &mut CreateUserForm<'_>, username: &str, password: &str, email: &str) {
		form.username = username.to_string();
		form.password = password.to_string();
		form.email = email.to_string();
	}

	#[test]
	fn password_rule_table() {
		assert_eq!(
			password_errors("1234"),
			vec![PASSWORD_LENGTH_ERROR, PASSWORD_LETTER_DIGIT_ERROR]
		);
		assert_eq!(
			password_errors("$!@#$%^&*()!@"),
			vec![PASSWORD_LENGTH_ERROR, PASSWORD_ALPHANUMERIC_ERROR, PASSWORD_LETTER_DIGIT_ERROR]
		);
		assert_eq!(password_errors("abcabc123"), vec![PASSWORD_REPEATED_SEQUENCE_ERROR]);
		assert!(password_errors("abc12").is_empty());
	}

	#[test]
	fn length_bounds_are_inclusive() {
		assert!(password_errors("abc1d").is_empty());
		assert!(password_errors("abcdefghij12").is_empty());
		assert!(password_errors("abc1").contains(&PASSWORD_LENGTH_ERROR.to_string()));
		assert!(password_errors("abcdefghijk12").contains(&PASSWORD_LENGTH_ERROR.to_string()));
	}

	#[test]
	fn letters_only_fails_letter_digit_rule() {
		assert_eq!(password_errors("abcdef"), vec![PASSWORD_LETTER_DIGIT_ERROR]);
	}

	#[test]
	fn non_ascii_letters_are_not_alphanumeric() {
		let errs = password_errors("abçd12");
		assert_eq!(errs, vec![PASSWORD_ALPHANUMERIC_ERROR]);
	}

	#[test]
	fn adjacent_repeat_detection() {
		let has = |s: &str| has_adjacent_repeat(&s.chars().collect::<Vec<_>>());
		assert!(has("abcabc"));
		assert!(has("ababab"));
		assert!(has("x1ab1ab"));
		assert!(!has("aa1b2"));
		assert!(!has("ab1ab"));
		assert!(!has("abc12"));
		assert!(!has(""));
	}

	#[test]
	fn required_fields_are_all_reported() {
		let mut s = store();
		let mut form = CreateUserForm::new(&mut s);
		assert_eq!(
			form.validate_required_fields(),
			vec![USERNAME_REQUIRED_ERROR, PASSWORD_REQUIRED_ERROR, EMAIL_REQUIRED_ERROR]
		);
		fill(&mut form, "bob", "", "bob@example.com");
		assert_eq!(form.validate_required_fields(), vec![PASSWORD_REQUIRED_ERROR]);
		assert!(!form.can_save());
		form.password = "abc12".into();
		assert!(form.can_save());
	}

	#[test]
	fn rejected_save_publishes_one_batch_and_adds_nothing() {
		let mut s = store();
		let mut form = CreateUserForm::new(&mut s);
		let batches = Rc::new(RefCell::new(Vec::new()));
		let saves = Rc::new(Cell::new(0));
		let b = Rc::clone(&batches);
		let c = Rc::clone(&saves);
		form.errors().subscribe(move |e: &Vec<String>| b.borrow_mut().push(e.clone()));
		form.saved().subscribe(move |_| c.set(c.get() + 1));

		fill(&mut form, "", "1234", "bob@example.com");
		assert_eq!(form.save(false), None);

		assert_eq!(batches.borrow().len(), 1);
		assert_eq!(
			batches.borrow()[0],
			vec![USERNAME_REQUIRED_ERROR, PASSWORD_LENGTH_ERROR, PASSWORD_LETTER_DIGIT_ERROR]
		);
		assert_eq!(saves.get(), 0);
		assert_eq!(form.store().count(), 0);
	}

	#[test]
	fn successful_save_adds_one_user_and_signals_once() {
		let mut s = store();
		let mut form = CreateUserForm::new(&mut s);
		let saves = Rc::new(Cell::new(0));
		let batches = Rc::new(Cell::new(0));
		let c = Rc::clone(&saves);
		let b = Rc::clone(&batches);
		form.saved().subscribe(move |_| c.set(c.get() + 1));
		form.errors().subscribe(move |_| b.set(b.get() + 1));

		fill(&mut form, "pperez", "abc12", "pperez@slipsleeve.com");
		form.is_admin = true;
		let id = form.save(false).expect("saved");

		assert_eq!(saves.get(), 1);
		assert_eq!(batches.get(), 0);
		assert_eq!(form.username, "pperez");
		assert!(form.take_pending_persist().is_none());
		let saved = form.store().fetch(&id).unwrap();
		assert!(saved.is_admin);
		assert_eq!(saved.email, "pperez@slipsleeve.com");
		drop(form);
		assert_eq!(s.count(), 1);
	}

	#[test]
	fn persisting_save_writes_through_to_settings() {
		let settings = Arc::new(MemorySettings::new());
		let mut s = UserStore::new(settings.clone());
		let mut form = CreateUserForm::new(&mut s);
		fill(&mut form, "ann", "abc12", "ann@example.com");
		form.save(true).unwrap();
		assert!(form.take_pending_persist().unwrap().wait());
		assert_eq!(UserStore::new(settings).count(), 1);
	}
}
