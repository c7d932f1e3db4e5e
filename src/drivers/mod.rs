//! Hardware drivers.
//!
//! | Module     | Hardware                                   |
//! |------------|--------------------------------------------|
//! | `hw_init`  | ADC1 oneshot channels, front-panel inputs  |
//! | `valve`    | Inlet / outlet / bleed solenoids           |
//! | `motion`   | Bag squeezer stroke drive                  |

pub mod hw_init;
pub mod motion;
pub mod valve;
