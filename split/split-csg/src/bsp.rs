//! Binary space partitioning tree over polygon soups.
//!
//! Each node holds the polygons coplanar with its splitting plane; front and
//! back children partition the remaining space. Booleans are expressed as
//! clip/invert/build sequences over two trees.

use crate::plane::Plane;
use crate::polygon::Polygon;

/// One node of a BSP tree.
#[derive(Debug, Default)]
pub(crate) struct Node {
    plane: Option<Plane>,
    front: Option<Box<Node>>,
    back: Option<Box<Node>>,
    polygons: Vec<Polygon>,
}

impl Node {
    /// Build a tree from a polygon soup.
    pub fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Flip solid and empty space: invert all planes, polygons, and swap
    /// children.
    pub fn invert(&mut self) {
        for p in &mut self.polygons {
            p.flip();
        }
        if let Some(plane) = &mut self.plane {
            plane.flip();
        }
        if let Some(front) = &mut self.front {
            front.invert();
        }
        if let Some(back) = &mut self.back {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove the parts of `polygons` inside this tree's solid volume.
    pub fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = self.plane else {
            return polygons;
        };

        let mut front = Vec::new();
        let mut back = Vec::new();
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        for polygon in &polygons {
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        // Coplanar polygons ride with the side their normal faces
        front.extend(coplanar_front);
        back.extend(coplanar_back);

        let mut front = match &self.front {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        let back = match &self.back {
            Some(node) => node.clip_polygons(back),
            // No back child: back space is solid, polygons inside are dropped
            None => Vec::new(),
        };

        front.extend(back);
        front
    }

    /// Clip every polygon in this tree against `other`.
    pub fn clip_to(&mut self, other: &Node) {
        self.polygons = other.clip_polygons(std::mem::take(&mut self.polygons));
        if let Some(front) = &mut self.front {
            front.clip_to(other);
        }
        if let Some(back) = &mut self.back {
            back.clip_to(other);
        }
    }

    /// Collect all polygons in the tree.
    pub fn all_polygons(&self) -> Vec<Polygon> {
        let mut out = self.polygons.clone();
        if let Some(front) = &self.front {
            out.extend(front.all_polygons());
        }
        if let Some(back) = &self.back {
            out.extend(back.all_polygons());
        }
        out
    }

    /// Insert polygons, splitting them across existing planes.
    ///
    /// The first polygon's plane seeds a fresh node.
    pub fn build(&mut self, polygons: Vec<Polygon>) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = *self.plane.get_or_insert(first.plane);

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for polygon in &polygons {
            plane.split_polygon(
                polygon,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        self.polygons.extend(coplanar_front);
        self.polygons.extend(coplanar_back);

        if !front.is_empty() {
            self.front
                .get_or_insert_with(Box::default)
                .build(front);
        }
        if !back.is_empty() {
            self.back
                .get_or_insert_with(Box::default)
                .build(back);
        }
    }
}
