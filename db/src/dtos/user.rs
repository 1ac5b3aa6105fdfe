pub struct ProfileUpsert {
    pub username: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}
