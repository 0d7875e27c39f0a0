pub mod currency;
pub mod news;
pub mod weather;

pub use currency::CurrencyFetcher;
pub use news::NewsFetcher;
pub use weather::WeatherFetcher;
