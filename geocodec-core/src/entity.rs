//! Closed set of loadable/savable geometry entities

use crate::mesh::Mesh;
use crate::point_cloud::PointCloud;

/// The geometry produced by a load, or handed to a save
#[derive(Debug, Clone)]
pub enum Entity {
    Cloud(PointCloud),
    Mesh(Mesh),
}

impl Entity {
    /// The point cloud holding the entity's points
    pub fn cloud(&self) -> &PointCloud {
        match self {
            Entity::Cloud(cloud) => cloud,
            Entity::Mesh(mesh) => &mesh.vertices,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Entity::Mesh(mesh) => Some(mesh),
            Entity::Cloud(_) => None,
        }
    }

    pub fn into_mesh(self) -> Option<Mesh> {
        match self {
            Entity::Mesh(mesh) => Some(mesh),
            Entity::Cloud(_) => None,
        }
    }

    /// The cloud itself, or the vertices of a mesh
    pub fn into_cloud(self) -> PointCloud {
        match self {
            Entity::Cloud(cloud) => cloud,
            Entity::Mesh(mesh) => mesh.vertices,
        }
    }
}

impl From<PointCloud> for Entity {
    fn from(cloud: PointCloud) -> Self {
        Entity::Cloud(cloud)
    }
}

impl From<Mesh> for Entity {
    fn from(mesh: Mesh) -> Self {
        Entity::Mesh(mesh)
    }
}
