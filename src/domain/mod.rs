// Domain layer - sensor readings, series history and view window
pub mod interpolation;
pub mod reading;
pub mod selection;
pub mod sensor;
pub mod series;
pub mod window;
