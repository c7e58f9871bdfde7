pub mod health;
pub use self::health::health;

pub mod signup;
pub use self::signup::signup;
