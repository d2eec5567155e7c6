use crate::model::User;

/// Case-insensitive substring filter over username, email and id.
///
/// An empty (or all-whitespace) query keeps every user. Store order is kept.
pub fn filter_users<'a>(users: &'a [User], query: &str) -> Vec<&'a User> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return users.iter().collect();
    }
    users
        .iter()
        .filter(|u| {
            u.username.to_lowercase().contains(&q)
                || u.email.to_lowercase().contains(&q)
                || u.user_id.to_lowercase().contains(&q)
        })
        .collect()
}
