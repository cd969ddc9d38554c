pub mod animal;
pub mod favorite;
pub mod profile;
pub mod shelter;

pub use animal::{
    Animal, AnimalCard, AnimalDetail, AnimalStatus, AnimalUpdate, NewAnimal, Photos, Sex, Size,
    Species,
};
pub use favorite::Favorite;
pub use profile::Profile;
pub use shelter::Shelter;
