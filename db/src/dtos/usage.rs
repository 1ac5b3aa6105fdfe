/// Amounts added to a month's counter in one atomic step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageDelta {
    pub recipes: i32,
    pub images: i32,
    pub image_bytes: i64,
}

impl UsageDelta {
    pub fn recipe() -> Self {
        Self {
            recipes: 1,
            ..Default::default()
        }
    }

    pub fn image(size: i64) -> Self {
        Self {
            images: 1,
            image_bytes: size,
            ..Default::default()
        }
    }
}
