mod client;

pub use client::{
    ApiErrorClass, DiskClient, DiskError, Link, Resource, ResourceList, ResourceType,
};
